// api.rs - Idiomatic Rust API for gnurex.
//
// Wraps the GNU/POSIX-shaped internals (re_compile_internal,
// re_search_internal) with Rust-native types: Regex, RegexBuilder, Match,
// Captures, FindIter.

use std::ops::Range;
use std::sync::Arc;

use crate::alloc::RegAllocator;
use crate::encodings::ascii::ENCODING_ASCII;
use crate::encodings::utf8::ENCODING_UTF8;
use crate::error::RegexError;
use crate::regcomp::{re_compile_fastmap, re_compile_internal};
use crate::regex::{
    ExecFlags, PatternBuffer, RegErrcode, RegMatch, Syntax, RE_SYNTAX_POSIX_BASIC,
    RE_SYNTAX_POSIX_EXTENDED,
};
use crate::regexec::re_search_internal;

/// A compiled regular expression.
///
/// Patterns use POSIX extended syntax by default and match leftmost-longest.
///
/// # Examples
///
/// ```
/// use gnurex::api::Regex;
///
/// let re = Regex::new(r"[0-9]+").unwrap();
/// assert!(re.is_match("hello 42"));
///
/// let m = re.find("hello 42").unwrap();
/// assert_eq!(m.as_str(), "42");
/// assert_eq!(m.start(), 6);
/// assert_eq!(m.end(), 8);
/// ```
pub struct Regex {
    inner: PatternBuffer,
}

impl Regex {
    /// Compile a pattern with default options (POSIX extended, UTF-8).
    pub fn new(pattern: &str) -> Result<Regex, RegexError> {
        RegexBuilder::new(pattern).build()
    }

    /// Compile a pattern from raw bytes with default options.
    pub fn new_bytes(pattern: &[u8]) -> Result<Regex, RegexError> {
        RegexBuilder::from_bytes(pattern).build()
    }

    /// Create a [`RegexBuilder`] for fine-grained control over compilation.
    pub fn builder(pattern: &str) -> RegexBuilder {
        RegexBuilder::new(pattern)
    }

    /// Run one search from `start`; `nregs` registers are filled.
    fn try_search_at(
        &self,
        text: &[u8],
        start: usize,
        nregs: usize,
    ) -> Result<Option<Vec<RegMatch>>, RegexError> {
        if start > text.len() {
            return Ok(None);
        }
        let mut pmatch = vec![RegMatch::UNSET; nregs.max(1)];
        let found = re_search_internal(
            &self.inner,
            text,
            start,
            text.len(),
            text.len(),
            nregs,
            &mut pmatch,
            ExecFlags::empty(),
        )
        .map_err(|e| match e {
            RegErrcode::ESpace => RegexError::Memory,
            e => RegexError::internal(e),
        })?;
        Ok(found.then_some(pmatch))
    }

    /// Like [`Regex::try_search_at`], with errors logged and read as no match.
    fn search_at(&self, text: &[u8], start: usize, nregs: usize) -> Option<Vec<RegMatch>> {
        self.try_search_at(text, start, nregs).unwrap_or_else(|e| {
            debug!("search failed: {}", e);
            None
        })
    }

    fn nregs(&self) -> usize {
        if self.inner.no_sub {
            1
        } else {
            self.inner.re_nsub + 1
        }
    }

    /// Like [`Regex::find_bytes`], but reports allocator refusals and other
    /// matcher errors instead of treating them as no match.
    pub fn try_find_bytes<'t>(&self, text: &'t [u8]) -> Result<Option<Match<'t>>, RegexError> {
        let found = self.try_search_at(text, 0, 1)?;
        Ok(found.map(|pmatch| Match::from_reg(text, pmatch[0])))
    }

    /// Return the first match in `text`, or `None` if no match.
    pub fn find<'t>(&self, text: &'t str) -> Option<Match<'t>> {
        self.find_bytes(text.as_bytes())
    }

    /// Return the first match in `text` (as bytes), or `None` if no match.
    pub fn find_bytes<'t>(&self, text: &'t [u8]) -> Option<Match<'t>> {
        self.find_at_bytes(text, 0)
    }

    /// Return the first match starting at or after byte `start`.
    pub fn find_at_bytes<'t>(&self, text: &'t [u8], start: usize) -> Option<Match<'t>> {
        let pmatch = self.search_at(text, start, 1)?;
        Some(Match::from_reg(text, pmatch[0]))
    }

    /// Check whether `text` matches the pattern anywhere.
    pub fn is_match(&self, text: &str) -> bool {
        self.is_match_bytes(text.as_bytes())
    }

    /// Check whether `text` (as bytes) matches the pattern anywhere.
    pub fn is_match_bytes(&self, text: &[u8]) -> bool {
        self.search_at(text, 0, 0).is_some()
    }

    /// Like [`Regex::is_match_bytes`], but an error is not a `false`.
    pub fn try_is_match_bytes(&self, text: &[u8]) -> Result<bool, RegexError> {
        Ok(self.try_search_at(text, 0, 0)?.is_some())
    }

    /// Return the first match with all capture groups, or `None`.
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.captures_bytes(text.as_bytes())
    }

    /// Return the first match with all capture groups (bytes), or `None`.
    pub fn captures_bytes<'t>(&self, text: &'t [u8]) -> Option<Captures<'t>> {
        let regs = self.search_at(text, 0, self.nregs())?;
        Some(Captures { text, regs })
    }

    /// Like [`Regex::captures_bytes`], but reports matcher errors.
    pub fn try_captures_bytes<'t>(
        &self,
        text: &'t [u8],
    ) -> Result<Option<Captures<'t>>, RegexError> {
        let found = self.try_search_at(text, 0, self.nregs())?;
        Ok(found.map(|regs| Captures { text, regs }))
    }

    /// Iterate over all non-overlapping matches in `text`.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> FindIter<'r, 't> {
        self.find_iter_bytes(text.as_bytes())
    }

    /// Iterate over all non-overlapping matches in `text` (as bytes).
    pub fn find_iter_bytes<'r, 't>(&'r self, text: &'t [u8]) -> FindIter<'r, 't> {
        FindIter {
            regex: self,
            text,
            last_end: 0,
            last_match: None,
        }
    }

    /// Return the number of capture groups in the pattern (excluding group 0).
    pub fn captures_len(&self) -> usize {
        self.inner.re_nsub
    }

    /// Whether the pattern can match the empty string.
    pub fn can_be_null(&self) -> bool {
        self.inner.can_be_null
    }

    /// Access the underlying pattern buffer for GNU/POSIX-style calls.
    pub fn as_raw(&self) -> &PatternBuffer {
        &self.inner
    }
}

impl std::fmt::Debug for Regex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regex")
            .field("syntax", &self.inner.syntax)
            .field("re_nsub", &self.inner.re_nsub)
            .finish_non_exhaustive()
    }
}

// === RegexBuilder ===

/// Builder for compiling a [`Regex`] with custom options.
///
/// # Examples
///
/// ```
/// use gnurex::api::Regex;
///
/// let re = Regex::builder(r"hello world")
///     .case_insensitive(true)
///     .build()
///     .unwrap();
/// assert!(re.is_match("Hello World"));
/// ```
pub struct RegexBuilder {
    pattern: Vec<u8>,
    syntax: Option<Syntax>,
    extended: bool,
    icase: bool,
    newline: bool,
    no_sub: bool,
    utf8: bool,
    translate: Option<Box<[u8; 256]>>,
    allocator: Option<Arc<dyn RegAllocator>>,
}

impl RegexBuilder {
    /// Create a new builder for the given pattern.
    pub fn new(pattern: &str) -> Self {
        Self::from_bytes(pattern.as_bytes())
    }

    pub fn from_bytes(pattern: &[u8]) -> Self {
        RegexBuilder {
            pattern: pattern.to_vec(),
            syntax: None,
            extended: true,
            icase: false,
            newline: false,
            no_sub: false,
            utf8: true,
            translate: None,
            allocator: None,
        }
    }

    /// Use an explicit syntax (one of the `RE_SYNTAX_*` presets or a custom
    /// combination). Overrides [`RegexBuilder::extended`].
    pub fn syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = Some(syntax);
        self
    }

    /// POSIX extended (default) or basic syntax.
    pub fn extended(mut self, yes: bool) -> Self {
        self.extended = yes;
        self
    }

    /// Enable or disable case-insensitive matching.
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.icase = yes;
        self
    }

    /// `REG_NEWLINE` behavior: `.` and `[^...]` stop at newlines and
    /// `^`/`$` match at line boundaries.
    pub fn newline(mut self, yes: bool) -> Self {
        self.newline = yes;
        self
    }

    /// Only report whether and where the whole pattern matched.
    pub fn no_sub(mut self, yes: bool) -> Self {
        self.no_sub = yes;
        self
    }

    /// Treat pattern and subject as UTF-8 (default) or as single bytes.
    pub fn utf8(mut self, yes: bool) -> Self {
        self.utf8 = yes;
        self
    }

    /// Byte translation applied to both pattern and subject.
    pub fn translate(mut self, table: [u8; 256]) -> Self {
        self.translate = Some(Box::new(table));
        self
    }

    /// Charge compile and match memory to `allocator`.
    pub fn allocator(mut self, allocator: Arc<dyn RegAllocator>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Compile the pattern into a [`Regex`].
    pub fn build(self) -> Result<Regex, RegexError> {
        let mut buf = if self.utf8 {
            PatternBuffer::with_encoding(&ENCODING_UTF8)
        } else {
            PatternBuffer::with_encoding(&ENCODING_ASCII)
        };
        if let Some(allocator) = self.allocator {
            buf.allocator = allocator;
        }
        buf.translate = self.translate;

        let mut syntax = self.syntax.unwrap_or(if self.extended {
            RE_SYNTAX_POSIX_EXTENDED
        } else {
            RE_SYNTAX_POSIX_BASIC
        });
        if self.icase {
            syntax |= Syntax::ICASE;
        }
        if self.newline {
            syntax.remove(Syntax::DOT_NEWLINE);
            syntax |= Syntax::HAT_LISTS_NOT_NEWLINE;
        }
        buf.newline_anchor = self.newline;
        buf.no_sub = self.no_sub;

        re_compile_internal(&mut buf, &self.pattern, syntax)?;
        buf.fastmap = Some(Box::default());
        re_compile_fastmap(&mut buf);
        Ok(Regex { inner: buf })
    }
}

// === Match ===

/// A single match result referencing the original text.
#[derive(Debug, Clone, Copy)]
pub struct Match<'t> {
    text: &'t [u8],
    start: usize,
    end: usize,
}

impl<'t> Match<'t> {
    fn from_reg(text: &'t [u8], reg: RegMatch) -> Self {
        Match {
            text,
            start: reg.rm_so as usize,
            end: reg.rm_eo as usize,
        }
    }

    /// Byte offset of the start of the match.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset of the end of the match (exclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// Byte range of the match.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The matched text as a byte slice.
    pub fn as_bytes(&self) -> &'t [u8] {
        &self.text[self.start..self.end]
    }

    /// The matched text as a `&str`.
    ///
    /// # Panics
    ///
    /// Panics if the matched bytes are not valid UTF-8.
    pub fn as_str(&self) -> &'t str {
        std::str::from_utf8(self.as_bytes()).expect("match is not valid UTF-8")
    }

    /// Returns the length of the match in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` if the match is empty (zero-length).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// === Captures ===

/// All capture groups from a single match.
///
/// Group 0 is the entire match. Groups 1..N correspond to `(...)` in the pattern.
pub struct Captures<'t> {
    text: &'t [u8],
    regs: Vec<RegMatch>,
}

impl<'t> Captures<'t> {
    /// Get capture group `i`, or `None` if the group did not participate.
    ///
    /// Group 0 is the entire match.
    pub fn get(&self, i: usize) -> Option<Match<'t>> {
        let reg = *self.regs.get(i)?;
        if !reg.is_set() {
            return None;
        }
        Some(Match::from_reg(self.text, reg))
    }

    /// Number of capture groups (including group 0).
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    /// Returns `true` if there are no capture groups (should never happen for a valid match).
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Iterate over all capture groups.
    pub fn iter(&self) -> CapturesIter<'_, 't> {
        CapturesIter {
            captures: self,
            index: 0,
        }
    }
}

impl std::fmt::Debug for Captures<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for i in 0..self.len() {
            list.entry(&self.get(i).map(|m| m.range()));
        }
        list.finish()
    }
}

// === CapturesIter ===

/// Iterator over capture groups in a [`Captures`].
pub struct CapturesIter<'c, 't> {
    captures: &'c Captures<'t>,
    index: usize,
}

impl<'c, 't> Iterator for CapturesIter<'c, 't> {
    type Item = Option<Match<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.captures.len() {
            return None;
        }
        let m = self.captures.get(self.index);
        self.index += 1;
        Some(m)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.captures.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CapturesIter<'_, '_> {}

// === FindIter ===

/// Iterator over all non-overlapping matches in a text.
pub struct FindIter<'r, 't> {
    regex: &'r Regex,
    text: &'t [u8],
    last_end: usize,
    last_match: Option<usize>,
}

impl<'r, 't> Iterator for FindIter<'r, 't> {
    type Item = Match<'t>;

    fn next(&mut self) -> Option<Match<'t>> {
        loop {
            if self.last_end > self.text.len() {
                return None;
            }
            let m = self.regex.find_at_bytes(self.text, self.last_end)?;

            // No empty match where the previous match ended.
            if m.is_empty() && self.last_match == Some(m.end()) {
                if self.last_end >= self.text.len() {
                    return None;
                }
                let step = self
                    .regex
                    .inner
                    .encoding
                    .mbc_enc_len(&self.text[self.last_end..])
                    .max(1);
                self.last_end = (self.last_end + step).min(self.text.len());
                continue;
            }

            self.last_end = m.end();
            self.last_match = Some(m.end());
            return Some(m);
        }
    }
}
