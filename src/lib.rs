//! Bootstrap compiler for a small, statically typed, stack-oriented
//! programming language: source text in, a flat byte image for a custom
//! stack VM out.

pub mod compiler;
