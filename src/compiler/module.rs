//! Import resolution: merges one or more parsed files into a single `Ast`.
//!
//! Simplified from `examples/myuon-moca/src/compiler/module.rs`'s
//! `ModuleLoader`: our grammar's `import "path";` is always a literal,
//! relative, `cwd`-rooted path string (§6.2) — there is no dotted
//! absolute-import search-path concept to carry over.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::compiler::ast::Ast;
use crate::compiler::error::CompileError;
use crate::compiler::lexer::Lexer;
use crate::compiler::parser::Parser;

pub struct ModuleLoader {
    cache: HashMap<PathBuf, Ast>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self { cache: HashMap::new() }
    }

    /// Parse `entry_path` and recursively merge every file it (transitively)
    /// imports into one `Ast`. Import paths are resolved relative to the
    /// directory of the file that names them.
    pub fn load(&mut self, entry_path: &Path) -> Result<Ast, CompileError> {
        let mut merged = Ast::default();
        let mut visited = HashMap::new();
        self.load_into(entry_path, &mut merged, &mut visited)?;
        Ok(merged)
    }

    fn load_into(
        &mut self,
        path: &Path,
        merged: &mut Ast,
        visited: &mut HashMap<PathBuf, ()>,
    ) -> Result<(), CompileError> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if visited.contains_key(&canonical) {
            return Ok(());
        }
        visited.insert(canonical.clone(), ());

        let ast = self.parse_file(path)?;

        for import in &ast.imports {
            let import_path = path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&import.path);
            self.load_into(&import_path, merged, visited)?;
        }

        merged.types.extend(ast.types.iter().cloned());
        merged.lets.extend(ast.lets.iter().cloned());
        merged.funs.extend(ast.funs.iter().cloned());
        Ok(())
    }

    fn parse_file(&mut self, path: &Path) -> Result<Ast, CompileError> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(ast) = self.cache.get(&canonical) {
            return Ok(ast.clone());
        }
        let source = std::fs::read_to_string(path).map_err(|e| {
            CompileError::Io(format!("reading '{}': {}", path.display(), e))
        })?;
        let filename = path.to_string_lossy().to_string();
        let mut lexer = Lexer::new(&filename, &source);
        let tokens = lexer.scan_tokens()?;
        let mut parser = Parser::new(&filename, tokens);
        let ast = parser.parse()?;
        self.cache.insert(canonical, ast.clone());
        Ok(ast)
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn merges_imported_functions() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("lib.stk"),
            "fun{inline} id(u8:u8) { }",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("main.stk"),
            r#"import "lib.stk"; fun{unsafe} __start(:) { }"#,
        )
        .unwrap();

        let mut loader = ModuleLoader::new();
        let ast = loader.load(&dir.path().join("main.stk")).unwrap();
        assert_eq!(ast.funs.len(), 2);
        assert!(ast.funs.iter().any(|f| f.name == "id"));
        assert!(ast.funs.iter().any(|f| f.name == "__start"));
    }

    #[test]
    fn does_not_duplicate_diamond_imports() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("base.stk"), "fun{inline} id(u8:u8) { }").unwrap();
        std::fs::write(
            dir.path().join("a.stk"),
            r#"import "base.stk"; fun{inline} via_a(u8:u8) { id }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.stk"),
            r#"import "base.stk"; fun{inline} via_b(u8:u8) { id }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("main.stk"),
            r#"import "a.stk"; import "b.stk"; fun{unsafe} __start(:) { }"#,
        )
        .unwrap();

        let mut loader = ModuleLoader::new();
        let ast = loader.load(&dir.path().join("main.stk")).unwrap();
        assert_eq!(ast.funs.iter().filter(|f| f.name == "id").count(), 1);
    }
}
