//! # gnurex
//!
//! Pure-Rust implementation of the GNU/POSIX regular expression interface:
//! BRE and ERE syntax plus the GNU operators, leftmost-longest matching on a
//! lazily built DFA, and backtracking verification for back-references.
//!
//! ## Quick Start
//!
//! ```rust
//! use gnurex::prelude::*;
//!
//! let re = Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}").unwrap();
//! let m = re.find("Date: 2026-02-12").unwrap();
//! assert_eq!(m.as_str(), "2026-02-12");
//! assert_eq!(m.start(), 6);
//! ```
//!
//! For fine-grained control, use [`RegexBuilder`](api::RegexBuilder):
//!
//! ```rust
//! use gnurex::prelude::*;
//!
//! let re = Regex::builder(r"hello")
//!     .case_insensitive(true)
//!     .build()
//!     .unwrap();
//! assert!(re.is_match("Hello World"));
//! ```
//!
//! ## POSIX API
//!
//! ```rust
//! use gnurex::regcomp::regcomp;
//! use gnurex::regexec::regexec;
//! use gnurex::regex::*;
//!
//! let mut preg = PatternBuffer::new();
//! assert_eq!(regcomp(&mut preg, b"(a|ab)(c|bcd)(d*)", CompileFlags::EXTENDED), RegErrcode::NoError);
//!
//! let mut pmatch = [RegMatch::UNSET; 4];
//! assert_eq!(regexec(&preg, b"abcd", &mut pmatch, ExecFlags::empty()), RegErrcode::NoError);
//! assert_eq!((pmatch[0].rm_so, pmatch[0].rm_eo), (0, 4));
//! ```
//!
//! ## GNU API
//!
//! ```rust
//! use gnurex::regcomp::re_compile_pattern;
//! use gnurex::regexec::re_search;
//! use gnurex::regex::*;
//!
//! let mut buf = PatternBuffer::new();
//! re_compile_pattern(b"\\(fo*\\)bar", RE_SYNTAX_POSIX_BASIC, &mut buf).unwrap();
//!
//! let mut regs = Registers::new();
//! let subject = b"xx foobar";
//! assert_eq!(re_search(&mut buf, subject, 0, subject.len() as RegOff, Some(&mut regs)), 3);
//! assert_eq!((regs.start[1], regs.end[1]), (3, 6));
//! ```
//!
//! ## Module Structure
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`regex`] | Public types, syntax bits, error codes |
//! | [`regparse`] | Pattern parser |
//! | [`regcomp`] | Tree analysis, node program, `regcomp`/`re_compile_pattern` |
//! | [`regexec`] | DFA simulation, register recovery, `regexec`/`re_search` |
//! | [`dfastate`] | Interned DFA states and transition tables |
//! | [`restring`] | Case-folded, translated view of the subject |
//! | [`nodeset`] | Sorted node sets |
//! | [`bitset`] | 256-bit byte sets |
//! | [`regenc`] | Encoding trait |
//! | [`regerror`] | Error messages |
//! | [`alloc`] | Memory accounting |

#![allow(clippy::too_many_arguments)]
// Enable #[coverage(off)] attribute when running under cargo-llvm-cov on nightly.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[macro_use]
mod macros;

pub mod alloc;
pub mod api;
pub mod bitset;
pub mod dfastate;
pub mod encodings;
pub mod error;
pub mod nodeset;
pub mod prelude;
pub mod regcomp;
pub mod regenc;
pub mod regerror;
pub mod regex;
pub mod regexec;
pub mod regint;
pub mod regparse;
pub mod regparse_types;
pub mod restring;
