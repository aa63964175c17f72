// regparse.rs - Port of the parser half of regcomp.c
// Tokenizer and recursive-descent parser producing the syntax tree.
//
// Structure: lexer (peek_token / peek_token_bracket) → grammar
// (reg_exp → branch → expression → dup_op) → bracket expressions.

use crate::bitset::BitSet;
use crate::regenc::{CharClass, CodePoint};
use crate::regex::{LongestMatch, RegErrcode, Syntax, RE_DUP_MAX};
use crate::regint::{Charset, Constraint, Token, TokenType, BKREF_MAP_BITS, BRACKET_NAME_BUF_SIZE};
use crate::regparse_types::*;
use crate::restring::{ReString, WINVALID};

type ParseResult<T> = Result<T, RegErrcode>;

// ============================================================================
// Lexer
// ============================================================================

fn is_word_at(input: &ReString, idx: usize, env: &ParseEnv) -> bool {
    if input.is_multibyte() {
        let wc = input.wchar_at(idx);
        wc != WINVALID && wc != crate::restring::WEOF && env.encoding.is_word_code(wc)
    } else {
        env.encoding.is_word_code(input.byte_at(idx) as CodePoint)
    }
}

/// Classify the token at the cursor without consuming it; returns its
/// byte length.
fn peek_token(token: &mut PToken, input: &mut ReString, syntax: Syntax, env: &ParseEnv) -> isize {
    if input.eoi() {
        token.ty = PTokenType::EndOfRe;
        return 0;
    }
    let c = input.peek_byte(0);
    token.c = c;
    token.word_char = false;
    token.mb_partial = false;
    let cur = input.cur_idx();
    if input.is_multibyte() && !input.first_byte(cur) {
        token.ty = PTokenType::Character;
        token.mb_partial = true;
        return 1;
    }

    if c == b'\\' {
        if cur + 1 >= input.len() {
            token.ty = PTokenType::BackSlash;
            return 1;
        }
        let c2 = input.peek_byte_case(1);
        token.c = c2;
        token.ty = PTokenType::Character;
        token.word_char = is_word_at(input, cur + 1, env);
        let gnu = !syntax.contains(Syntax::NO_GNU_OPS);
        match c2 {
            b'|' => {
                if !syntax.contains(Syntax::LIMITED_OPS) && !syntax.contains(Syntax::NO_BK_VBAR) {
                    token.ty = PTokenType::Alt;
                }
            }
            b'1'..=b'9' => {
                if !syntax.contains(Syntax::NO_BK_REFS) {
                    token.ty = PTokenType::BackRef;
                    token.idx = (c2 - b'1') as usize;
                }
            }
            b'<' if gnu => {
                token.ty = PTokenType::Anchor;
                token.ctx_type = Constraint::WORD_FIRST;
            }
            b'>' if gnu => {
                token.ty = PTokenType::Anchor;
                token.ctx_type = Constraint::WORD_LAST;
            }
            b'b' if gnu => {
                token.ty = PTokenType::Anchor;
                token.ctx_type = Constraint::WORD_DELIM;
            }
            b'B' if gnu => {
                token.ty = PTokenType::Anchor;
                token.ctx_type = Constraint::NOT_WORD_DELIM;
            }
            b'w' if gnu => token.ty = PTokenType::Word,
            b'W' if gnu => token.ty = PTokenType::NotWord,
            b's' if gnu => token.ty = PTokenType::Space,
            b'S' if gnu => token.ty = PTokenType::NotSpace,
            b'`' if gnu => {
                token.ty = PTokenType::Anchor;
                token.ctx_type = Constraint::BUF_FIRST;
            }
            b'\'' if gnu => {
                token.ty = PTokenType::Anchor;
                token.ctx_type = Constraint::BUF_LAST;
            }
            b'(' => {
                if !syntax.contains(Syntax::NO_BK_PARENS) {
                    token.ty = PTokenType::OpenSubexp;
                }
            }
            b')' => {
                if !syntax.contains(Syntax::NO_BK_PARENS) {
                    token.ty = PTokenType::CloseSubexp;
                }
            }
            b'+' => {
                if !syntax.contains(Syntax::LIMITED_OPS) && syntax.contains(Syntax::BK_PLUS_QM) {
                    token.ty = PTokenType::DupPlus;
                }
            }
            b'?' => {
                if !syntax.contains(Syntax::LIMITED_OPS) && syntax.contains(Syntax::BK_PLUS_QM) {
                    token.ty = PTokenType::DupQuestion;
                }
            }
            b'{' => {
                if syntax.contains(Syntax::INTERVALS) && !syntax.contains(Syntax::NO_BK_BRACES) {
                    token.ty = PTokenType::OpenDupNum;
                }
            }
            b'}' => {
                if syntax.contains(Syntax::INTERVALS) && !syntax.contains(Syntax::NO_BK_BRACES) {
                    token.ty = PTokenType::CloseDupNum;
                }
            }
            _ => {}
        }
        return 2;
    }

    token.ty = PTokenType::Character;
    token.word_char = is_word_at(input, cur, env);
    match c {
        b'\n' => {
            if syntax.contains(Syntax::NEWLINE_ALT) {
                token.ty = PTokenType::Alt;
            }
        }
        b'|' => {
            if !syntax.contains(Syntax::LIMITED_OPS) && syntax.contains(Syntax::NO_BK_VBAR) {
                token.ty = PTokenType::Alt;
            }
        }
        b'*' => token.ty = PTokenType::DupAsterisk,
        b'+' => {
            if !syntax.contains(Syntax::LIMITED_OPS) && !syntax.contains(Syntax::BK_PLUS_QM) {
                token.ty = PTokenType::DupPlus;
            }
        }
        b'?' => {
            if !syntax.contains(Syntax::LIMITED_OPS) && !syntax.contains(Syntax::BK_PLUS_QM) {
                token.ty = PTokenType::DupQuestion;
            }
        }
        b'{' => {
            if syntax.contains(Syntax::INTERVALS) && syntax.contains(Syntax::NO_BK_BRACES) {
                token.ty = PTokenType::OpenDupNum;
            }
        }
        b'}' => {
            if syntax.contains(Syntax::INTERVALS) && syntax.contains(Syntax::NO_BK_BRACES) {
                token.ty = PTokenType::CloseDupNum;
            }
        }
        b'(' => {
            if syntax.contains(Syntax::NO_BK_PARENS) {
                token.ty = PTokenType::OpenSubexp;
            }
        }
        b')' => {
            if syntax.contains(Syntax::NO_BK_PARENS) {
                token.ty = PTokenType::CloseSubexp;
            }
        }
        b'[' => token.ty = PTokenType::OpenBracket,
        b'.' => token.ty = PTokenType::Period,
        b'^' => {
            if !syntax.intersects(Syntax::CONTEXT_INDEP_ANCHORS | Syntax::CARET_ANCHORS_HERE)
                && cur != 0
            {
                let prev = input.peek_byte(-1);
                if !syntax.contains(Syntax::NEWLINE_ALT) || prev != b'\n' {
                    return 1;
                }
            }
            token.ty = PTokenType::Anchor;
            token.ctx_type = Constraint::LINE_FIRST;
        }
        b'$' => {
            if !syntax.contains(Syntax::CONTEXT_INDEP_ANCHORS) && cur + 1 != input.len() {
                let mut next = PToken::new();
                input.skip_bytes(1);
                peek_token(&mut next, input, syntax, env);
                input.skip_bytes(-1);
                if next.ty != PTokenType::Alt && next.ty != PTokenType::CloseSubexp {
                    return 1;
                }
            }
            token.ty = PTokenType::Anchor;
            token.ctx_type = Constraint::LINE_LAST;
        }
        _ => {}
    }
    1
}

fn fetch_token(token: &mut PToken, input: &mut ReString, syntax: Syntax, env: &ParseEnv) {
    let len = peek_token(token, input, syntax, env);
    input.skip_bytes(len);
}

/// Tokenizer used inside `[...]`. An escaped character consumes the
/// backslash here, so the returned length covers only what remains.
fn peek_token_bracket(token: &mut PToken, input: &mut ReString, syntax: Syntax) -> isize {
    if input.eoi() {
        token.ty = PTokenType::EndOfRe;
        return 0;
    }
    let c = input.peek_byte(0);
    token.c = c;
    let cur = input.cur_idx();
    if input.is_multibyte() && !input.first_byte(cur) {
        token.ty = PTokenType::Character;
        return 1;
    }
    if c == b'\\' && syntax.contains(Syntax::BACKSLASH_ESCAPE_IN_LISTS) && cur + 1 < input.len() {
        input.skip_bytes(1);
        token.c = input.peek_byte(0);
        token.ty = PTokenType::Character;
        return 1;
    }
    if c == b'[' {
        let c2 = if cur + 1 < input.len() {
            input.peek_byte(1)
        } else {
            0
        };
        token.c = c2;
        match c2 {
            b'.' => token.ty = PTokenType::OpenCollElem,
            b'=' => token.ty = PTokenType::OpenEquivClass,
            b':' if syntax.contains(Syntax::CHAR_CLASSES) => token.ty = PTokenType::OpenCharClass,
            _ => {
                token.ty = PTokenType::Character;
                token.c = c;
                return 1;
            }
        }
        return 2;
    }
    token.ty = match c {
        b'-' => PTokenType::CharsetRange,
        b']' => PTokenType::CloseBracket,
        b'^' => PTokenType::NonMatchList,
        _ => PTokenType::Character,
    };
    1
}

// ============================================================================
// Grammar
// ============================================================================

/// Parse the whole pattern; the result is `CONCAT(tree, END_OF_RE)`.
pub fn parse(regexp: &mut ReString, env: &mut ParseEnv) -> ParseResult<TreeIdx> {
    let syntax = env.syntax;
    let mut token = PToken::new();
    fetch_token(&mut token, regexp, syntax | Syntax::CARET_ANCHORS_HERE, env);
    let tree = parse_reg_exp(regexp, env, &mut token, syntax, 0)?;
    let eor = env.tree.create_tree(None, None, TokenType::EndOfRe)?;
    match tree {
        Some(t) => env.tree.create_tree(Some(t), Some(eor), TokenType::Concat),
        None => Ok(eor),
    }
}

//   reg_exp := branch ('|' branch)*
fn parse_reg_exp(
    regexp: &mut ReString,
    env: &mut ParseEnv,
    token: &mut PToken,
    syntax: Syntax,
    nest: usize,
) -> ParseResult<Option<TreeIdx>> {
    let initial_bkref_map = env.completed_bkref_map;
    let mut tree = parse_branch(regexp, env, token, syntax, nest)?;
    while token.ty == PTokenType::Alt {
        fetch_token(token, regexp, syntax | Syntax::CARET_ANCHORS_HERE, env);
        let branch = if token.ty != PTokenType::Alt
            && token.ty != PTokenType::EndOfRe
            && (nest == 0 || token.ty != PTokenType::CloseSubexp)
        {
            let accumulated = env.completed_bkref_map;
            env.completed_bkref_map = initial_bkref_map;
            let b = parse_branch(regexp, env, token, syntax, nest)?;
            env.completed_bkref_map |= accumulated;
            b
        } else {
            None
        };
        env.has_plural_match = true;
        tree = Some(env.tree.create_tree(tree, branch, TokenType::Alt)?);
    }
    Ok(tree)
}

//   branch := expression*
fn parse_branch(
    regexp: &mut ReString,
    env: &mut ParseEnv,
    token: &mut PToken,
    syntax: Syntax,
    nest: usize,
) -> ParseResult<Option<TreeIdx>> {
    let mut tree = parse_expression(regexp, env, token, syntax, nest)?;
    while token.ty != PTokenType::Alt
        && token.ty != PTokenType::EndOfRe
        && (nest == 0 || token.ty != PTokenType::CloseSubexp)
    {
        let expr = parse_expression(regexp, env, token, syntax, nest)?;
        tree = match (tree, expr) {
            (Some(t), Some(e)) => Some(env.tree.create_tree(Some(t), Some(e), TokenType::Concat)?),
            (None, e) => e,
            (t, None) => t,
        };
    }
    Ok(tree)
}

fn init_word_char(env: &mut ParseEnv) {
    env.word_ops_used = true;
}

//   expression := atom dup_op*
fn parse_expression(
    regexp: &mut ReString,
    env: &mut ParseEnv,
    token: &mut PToken,
    syntax: Syntax,
    nest: usize,
) -> ParseResult<Option<TreeIdx>> {
    let mut tree: Option<TreeIdx>;
    match token.ty {
        PTokenType::Character => {
            let mut t = env.tree.create_token_tree(None, None, token.to_token())?;
            if env.mb_cur_max > 1 {
                while !regexp.eoi() && !regexp.first_byte(regexp.cur_idx()) {
                    fetch_token(token, regexp, syntax, env);
                    let rest = env.tree.create_token_tree(None, None, token.to_token())?;
                    t = env.tree.create_tree(Some(t), Some(rest), TokenType::Concat)?;
                }
            }
            tree = Some(t);
        }
        PTokenType::OpenSubexp => {
            tree = Some(parse_sub_exp(regexp, env, token, syntax, nest + 1)?);
        }
        PTokenType::OpenBracket => {
            tree = Some(parse_bracket_exp(regexp, env, token, syntax)?);
        }
        PTokenType::BackRef => {
            if token.idx >= BKREF_MAP_BITS || env.completed_bkref_map & (1 << token.idx) == 0 {
                return Err(RegErrcode::ESubreg);
            }
            env.used_bkref_map |= 1 << token.idx;
            tree = Some(env.tree.create_token_tree(None, None, token.to_token())?);
            env.nbackref += 1;
            env.has_mb_node = true;
        }
        PTokenType::OpenDupNum
        | PTokenType::DupAsterisk
        | PTokenType::DupPlus
        | PTokenType::DupQuestion => {
            if token.ty == PTokenType::OpenDupNum && syntax.contains(Syntax::CONTEXT_INVALID_DUP) {
                return Err(RegErrcode::BadRpt);
            }
            if syntax.contains(Syntax::CONTEXT_INVALID_OPS)
                && !syntax.contains(Syntax::CONTEXT_INDEP_OPS)
            {
                return Err(RegErrcode::BadRpt);
            } else if syntax.contains(Syntax::CONTEXT_INDEP_OPS) {
                fetch_token(token, regexp, syntax, env);
                return parse_expression(regexp, env, token, syntax, nest);
            }
            // A leading operator is an ordinary character.
            token.ty = PTokenType::Character;
            tree = Some(env.tree.create_token_tree(None, None, token.to_token())?);
        }
        PTokenType::CloseSubexp | PTokenType::CloseDupNum => {
            if token.ty == PTokenType::CloseSubexp
                && !syntax.contains(Syntax::UNMATCHED_RIGHT_PAREN_ORD)
            {
                return Err(RegErrcode::ERParen);
            }
            token.ty = PTokenType::Character;
            tree = Some(env.tree.create_token_tree(None, None, token.to_token())?);
        }
        PTokenType::Anchor => {
            let ctx = token.ctx_type;
            if ctx.intersects(
                Constraint::WORD_DELIM
                    | Constraint::NOT_WORD_DELIM
                    | Constraint::WORD_FIRST
                    | Constraint::WORD_LAST,
            ) {
                init_word_char(env);
            }
            let t = if ctx == Constraint::WORD_DELIM || ctx == Constraint::NOT_WORD_DELIM {
                let (first, last) = if ctx == Constraint::WORD_DELIM {
                    (Constraint::WORD_FIRST, Constraint::WORD_LAST)
                } else {
                    (Constraint::INSIDE_NOTWORD, Constraint::INSIDE_WORD)
                };
                let a = env.tree.create_tree(None, None, TokenType::Anchor(first))?;
                let b = env.tree.create_tree(None, None, TokenType::Anchor(last))?;
                env.tree.create_tree(Some(a), Some(b), TokenType::Alt)?
            } else {
                env.tree.create_token_tree(None, None, token.to_token())?
            };
            // Anchors cannot be repeated: "^*" is "^" followed by a literal '*'.
            fetch_token(token, regexp, syntax | Syntax::CARET_ANCHORS_HERE, env);
            return Ok(Some(t));
        }
        PTokenType::Period => {
            tree = Some(env.tree.create_token_tree(None, None, token.to_token())?);
            if env.mb_cur_max > 1 {
                env.has_mb_node = true;
            }
        }
        PTokenType::Word | PTokenType::NotWord => {
            let non_match = token.ty == PTokenType::NotWord;
            tree = Some(build_charclass_op(env, CharClass::Alnum, b"_", non_match)?);
        }
        PTokenType::Space | PTokenType::NotSpace => {
            let non_match = token.ty == PTokenType::NotSpace;
            tree = Some(build_charclass_op(env, CharClass::Space, b"", non_match)?);
        }
        PTokenType::Alt | PTokenType::EndOfRe => return Ok(None),
        PTokenType::BackSlash => return Err(RegErrcode::EEscape),
        _ => return Ok(None),
    }
    fetch_token(token, regexp, syntax, env);

    while matches!(
        token.ty,
        PTokenType::DupAsterisk
            | PTokenType::DupPlus
            | PTokenType::DupQuestion
            | PTokenType::OpenDupNum
    ) {
        tree = parse_dup_op(tree, regexp, env, token, syntax)?;
        // In BRE consecutive duplications are not allowed.
        if syntax.contains(Syntax::CONTEXT_INVALID_DUP)
            && matches!(token.ty, PTokenType::DupAsterisk | PTokenType::OpenDupNum)
        {
            return Err(RegErrcode::BadRpt);
        }
    }
    Ok(tree)
}

//   sub_exp := '(' reg_exp ')'
fn parse_sub_exp(
    regexp: &mut ReString,
    env: &mut ParseEnv,
    token: &mut PToken,
    syntax: Syntax,
    nest: usize,
) -> ParseResult<TreeIdx> {
    let cur_nsub = env.re_nsub;
    env.re_nsub += 1;
    fetch_token(token, regexp, syntax | Syntax::CARET_ANCHORS_HERE, env);
    let tree = if token.ty == PTokenType::CloseSubexp {
        None
    } else {
        let t = parse_reg_exp(regexp, env, token, syntax, nest)?;
        if token.ty != PTokenType::CloseSubexp {
            return Err(RegErrcode::EParen);
        }
        t
    };
    if cur_nsub <= (b'9' - b'1') as usize {
        env.completed_bkref_map |= 1 << cur_nsub;
    }
    env.tree.create_tree(tree, None, TokenType::Subexp(cur_nsub))
}

/// Reads the decimal number of an interval bound. `None` means no digits
/// were present; `Err(())` an invalid sequence or end of pattern.
fn fetch_number(
    regexp: &mut ReString,
    token: &mut PToken,
    syntax: Syntax,
    env: &ParseEnv,
) -> Result<Option<usize>, ()> {
    let mut num: Result<Option<usize>, ()> = Ok(None);
    loop {
        fetch_token(token, regexp, syntax, env);
        let c = token.c;
        if token.ty == PTokenType::EndOfRe {
            return Err(());
        }
        if token.ty == PTokenType::CloseDupNum || c == b',' {
            break;
        }
        num = match num {
            _ if token.ty != PTokenType::Character || !c.is_ascii_digit() => Err(()),
            Err(()) => Err(()),
            Ok(None) => Ok(Some((c - b'0') as usize)),
            Ok(Some(n)) => Ok(Some((RE_DUP_MAX + 1).min(n * 10 + (c - b'0') as usize))),
        };
    }
    num
}

/// Wraps `elem` in the repetition described by `token` and consumes the
/// operator (and a lazy `?` suffix).
fn parse_dup_op(
    elem: Option<TreeIdx>,
    regexp: &mut ReString,
    env: &mut ParseEnv,
    token: &mut PToken,
    syntax: Syntax,
) -> ParseResult<Option<TreeIdx>> {
    let start_idx = regexp.cur_idx();
    let start_token = *token;
    let start: usize;
    let end: Option<usize>;

    if token.ty == PTokenType::OpenDupNum {
        let first = fetch_number(regexp, token, syntax, env);
        let first = match first {
            Ok(None) if token.ty == PTokenType::Character && token.c == b',' => Ok(0),
            // "{}"
            Ok(None) => return Err(RegErrcode::BadBr),
            Ok(Some(n)) => Ok(n),
            Err(()) => Err(()),
        };
        let second: Result<Option<usize>, ()> = match first {
            Ok(n) if token.ty == PTokenType::CloseDupNum => Ok(Some(n)),
            Ok(_) if token.ty == PTokenType::Character && token.c == b',' => {
                fetch_number(regexp, token, syntax, env)
            }
            _ => Err(()),
        };
        match (first, second) {
            (Ok(s), Ok(e)) => {
                if token.ty != PTokenType::CloseDupNum {
                    return Err(RegErrcode::BadBr);
                }
                if let Some(e) = e {
                    if s > e {
                        return Err(RegErrcode::EBracket);
                    }
                }
                if e.unwrap_or(s) > RE_DUP_MAX {
                    return Err(RegErrcode::ESize);
                }
                start = s;
                end = e;
            }
            _ => {
                if !syntax.contains(Syntax::INVALID_INTERVAL_ORD) {
                    return Err(if token.ty == PTokenType::EndOfRe {
                        RegErrcode::EBrace
                    } else {
                        RegErrcode::BadBr
                    });
                }
                // Roll back and read the '{' as a literal.
                regexp.set_index(start_idx);
                *token = start_token;
                token.ty = PTokenType::Character;
                return Ok(elem);
            }
        }
    } else {
        start = usize::from(token.ty == PTokenType::DupPlus);
        end = if token.ty == PTokenType::DupQuestion {
            Some(1)
        } else {
            None
        };
    }

    fetch_token(token, regexp, syntax, env);
    let mut lazy = false;
    if token.ty == PTokenType::DupQuestion && !syntax.contains(Syntax::NO_GNU_OPS) {
        lazy = true;
        fetch_token(token, regexp, syntax, env);
    }
    if env.fl_longest_match == LongestMatch::Unknown {
        env.fl_longest_match = if lazy {
            LongestMatch::Shortest
        } else {
            LongestMatch::Longest
        };
    }

    let Some(mut elem) = elem else {
        return Ok(None);
    };
    if start == 0 && end == Some(0) {
        return Ok(None);
    }
    env.has_plural_match = true;

    // Expand "<re>{n,m}" to "<re><re>...<re><re>{0,<m-n>}".
    let mut old_tree = None;
    if start > 0 {
        let mut tree = elem;
        for _ in 2..=start {
            elem = env.tree.duplicate_tree(elem)?;
            tree = env.tree.create_tree(Some(tree), Some(elem), TokenType::Concat)?;
        }
        if end == Some(start) {
            return Ok(Some(tree));
        }
        // Duplicate before marking optional.
        elem = env.tree.duplicate_tree(elem)?;
        old_tree = Some(tree);
    }

    if let TokenType::Subexp(subidx) = env.tree.token(elem).kind {
        env.tree.mark_opt_subexp(elem, subidx)?;
    }

    let kind = if end.is_none() {
        TokenType::DupAsterisk
    } else {
        TokenType::Alt
    };
    let mut tree = env.tree.create_tree(Some(elem), None, kind)?;
    if let Some(e) = end {
        for _ in (start + 2)..=e {
            elem = env.tree.duplicate_tree(elem)?;
            tree = env.tree.create_tree(Some(tree), Some(elem), TokenType::Concat)?;
            tree = env.tree.create_tree(Some(tree), None, TokenType::Alt)?;
        }
    }
    if let Some(old) = old_tree {
        tree = env.tree.create_tree(Some(old), Some(tree), TokenType::Concat)?;
    }
    Ok(Some(tree))
}

// ============================================================================
// Bracket expressions
// ============================================================================

/// Code point of a range endpoint.
fn range_endpoint(elem: &BracketElem, env: &ParseEnv) -> ParseResult<CodePoint> {
    match elem {
        BracketElem::SbChar(b) => {
            if env.mb_cur_max > 1 && *b >= 0x80 {
                Err(RegErrcode::ECollate)
            } else {
                Ok(*b as CodePoint)
            }
        }
        BracketElem::MbChar(wc) => Ok(*wc),
        BracketElem::CollSym(name) => single_char_name(name, env).ok_or(RegErrcode::ECollate),
        BracketElem::EquivClass(_) | BracketElem::CharClass(_) => Err(RegErrcode::ERange),
    }
}

/// The one character spelled by `name`, if it is exactly one.
fn single_char_name(name: &[u8], env: &ParseEnv) -> Option<CodePoint> {
    if name.len() == 1 {
        let b = name[0];
        if env.mb_cur_max > 1 && b >= 0x80 {
            return None;
        }
        return Some(b as CodePoint);
    }
    if env.mb_cur_max > 1 {
        if let Some((code, n)) = env.encoding.mbc_to_code(name) {
            if n == name.len() {
                return Some(code);
            }
        }
    }
    None
}

fn build_range_exp(
    sbcset: &mut BitSet,
    mbcset: &mut Charset,
    start_elem: &BracketElem,
    end_elem: &BracketElem,
    env: &ParseEnv,
    syntax: Syntax,
) -> ParseResult<()> {
    let start = range_endpoint(start_elem, env)?;
    let end = range_endpoint(end_elem, env)?;
    if start > end {
        if syntax.contains(Syntax::NO_EMPTY_RANGES) {
            return Err(RegErrcode::ERange);
        }
        return Ok(());
    }
    if env.mb_cur_max > 1 && end >= 0x80 {
        mbcset.ranges.push((start.max(0x80), end));
    }
    // Bytes above 0x7f are not characters on their own in a multibyte encoding.
    let sb_max = if env.mb_cur_max > 1 { 0x7f } else { 0xff };
    if start <= sb_max {
        for wc in start..=end.min(sb_max) {
            sbcset.set(wc as u8);
        }
    }
    Ok(())
}

fn add_single_char(
    sbcset: &mut BitSet,
    mbcset: &mut Charset,
    name: &[u8],
    env: &ParseEnv,
) -> ParseResult<()> {
    match single_char_name(name, env) {
        Some(code) if code < 0x80 || env.mb_cur_max == 1 => {
            sbcset.set(code as u8);
            Ok(())
        }
        Some(code) => {
            mbcset.mbchars.push(code);
            Ok(())
        }
        None => Err(RegErrcode::ECollate),
    }
}

fn build_charclass(
    sbcset: &mut BitSet,
    mbcset: Option<&mut Charset>,
    class_name: &[u8],
    env: &ParseEnv,
    syntax: Syntax,
) -> ParseResult<()> {
    // Under REG_ICASE "upper" and "lower" match both cases.
    let name: &[u8] = if syntax.contains(Syntax::ICASE)
        && (class_name == b"upper" || class_name == b"lower")
    {
        b"alpha"
    } else {
        class_name
    };
    let class = CharClass::from_name(name).ok_or(RegErrcode::ECtype)?;
    if env.mb_cur_max > 1 {
        if let Some(cs) = mbcset {
            cs.char_classes.push(class);
        }
    }
    let limit: u32 = if env.mb_cur_max > 1 { 0x80 } else { 0x100 };
    for i in 0..limit {
        if env.encoding.is_code_ctype(i, class) {
            let ch = match env.translate {
                Some(tr) => tr[i as usize],
                None => i as u8,
            };
            sbcset.set(ch);
        }
    }
    Ok(())
}

/// Tree for `\w`, `\W`, `\s`, `\S`.
fn build_charclass_op(
    env: &mut ParseEnv,
    class: CharClass,
    extra: &[u8],
    non_match: bool,
) -> ParseResult<TreeIdx> {
    let mut sbcset = BitSet::new();
    let mut mbcset = Charset {
        non_match,
        ..Charset::default()
    };
    build_charclass(&mut sbcset, Some(&mut mbcset), class.name().as_bytes(), env, Syntax::empty())?;
    for &b in extra {
        sbcset.set(b);
    }
    if non_match {
        sbcset.invert();
    }
    if env.mb_cur_max > 1 {
        sbcset.mask(&BitSet::ascii());
    }
    let simple = env
        .tree
        .create_tree(None, None, TokenType::SimpleBracket(Box::new(sbcset)))?;
    if env.mb_cur_max > 1 {
        let complex = env
            .tree
            .create_tree(None, None, TokenType::ComplexBracket(Box::new(mbcset)))?;
        env.has_mb_node = true;
        env.tree.create_tree(Some(simple), Some(complex), TokenType::Alt)
    } else {
        Ok(simple)
    }
}

/// Reads `name` of `[:name:]`, `[=name=]` or `[.name.]`; the cursor is
/// past the opening pair.
fn parse_bracket_symbol(regexp: &mut ReString, token: &PToken) -> ParseResult<BracketElem> {
    let delim = token.c;
    let mut name = Vec::new();
    if regexp.eoi() {
        return Err(RegErrcode::EBrack);
    }
    loop {
        if name.len() >= BRACKET_NAME_BUF_SIZE {
            return Err(RegErrcode::EBrack);
        }
        let ch = if token.ty == PTokenType::OpenCharClass {
            regexp.fetch_byte_case()
        } else {
            regexp.fetch_byte()
        };
        if regexp.eoi() {
            return Err(RegErrcode::EBrack);
        }
        if ch == delim && regexp.peek_byte(0) == b']' {
            break;
        }
        name.push(ch);
    }
    regexp.skip_bytes(1);
    Ok(match token.ty {
        PTokenType::OpenCollElem => BracketElem::CollSym(name),
        PTokenType::OpenEquivClass => BracketElem::EquivClass(name),
        _ => BracketElem::CharClass(name),
    })
}

fn parse_bracket_element(
    regexp: &mut ReString,
    token: &PToken,
    token_len: isize,
    syntax: Syntax,
    accept_hyphen: bool,
) -> ParseResult<BracketElem> {
    let cur = regexp.cur_idx();
    let cur_char_size = regexp.char_size_at(cur);
    if cur_char_size > 1 {
        let wc = regexp.wchar_at(cur);
        regexp.skip_bytes(cur_char_size as isize);
        return Ok(BracketElem::MbChar(wc));
    }
    regexp.skip_bytes(token_len);
    if matches!(
        token.ty,
        PTokenType::OpenCollElem | PTokenType::OpenCharClass | PTokenType::OpenEquivClass
    ) {
        return parse_bracket_symbol(regexp, token);
    }
    if token.ty == PTokenType::CharsetRange && !accept_hyphen {
        // A '-' that is not a range operator must end the list.
        let mut token2 = PToken::new();
        let saved = regexp.cur_idx();
        peek_token_bracket(&mut token2, regexp, syntax);
        regexp.set_index(saved);
        if token2.ty != PTokenType::CloseBracket {
            return Err(RegErrcode::ERange);
        }
    }
    Ok(BracketElem::SbChar(token.c))
}

fn parse_bracket_exp(
    regexp: &mut ReString,
    env: &mut ParseEnv,
    token: &mut PToken,
    syntax: Syntax,
) -> ParseResult<TreeIdx> {
    let mut sbcset = BitSet::new();
    let mut mbcset = Charset::default();
    let mut non_match = false;

    let mut token_len = peek_token_bracket(token, regexp, syntax);
    if token.ty == PTokenType::EndOfRe {
        return Err(RegErrcode::BadPat);
    }
    if token.ty == PTokenType::NonMatchList {
        non_match = true;
        if env.mb_cur_max > 1 {
            mbcset.non_match = true;
        }
        if syntax.contains(Syntax::HAT_LISTS_NOT_NEWLINE) {
            sbcset.set(b'\n');
        }
        regexp.skip_bytes(token_len);
        token_len = peek_token_bracket(token, regexp, syntax);
        if token.ty == PTokenType::EndOfRe {
            return Err(RegErrcode::BadPat);
        }
    }
    // The first ']' is an ordinary character.
    if token.ty == PTokenType::CloseBracket {
        token.ty = PTokenType::Character;
    }

    let mut first_round = true;
    loop {
        let start_elem = parse_bracket_element(regexp, token, token_len, syntax, first_round)?;
        first_round = false;

        token_len = peek_token_bracket(token, regexp, syntax);
        let mut range_end: Option<(PToken, isize)> = None;
        if !matches!(start_elem, BracketElem::CharClass(_) | BracketElem::EquivClass(_)) {
            if token.ty == PTokenType::EndOfRe {
                return Err(RegErrcode::EBrack);
            }
            if token.ty == PTokenType::CharsetRange {
                regexp.skip_bytes(token_len);
                let mut token2 = PToken::new();
                let before = regexp.cur_idx();
                let token_len2 = peek_token_bracket(&mut token2, regexp, syntax);
                if token2.ty == PTokenType::EndOfRe {
                    return Err(RegErrcode::EBrack);
                }
                if token2.ty == PTokenType::CloseBracket {
                    // A trailing '-' is an ordinary character.
                    regexp.set_index(before);
                    regexp.skip_bytes(-token_len);
                    token.ty = PTokenType::Character;
                } else {
                    range_end = Some((token2, token_len2));
                }
            }
        }

        if let Some((token2, token_len2)) = range_end {
            let end_elem = parse_bracket_element(regexp, &token2, token_len2, syntax, true)?;
            token_len = peek_token_bracket(token, regexp, syntax);
            build_range_exp(&mut sbcset, &mut mbcset, &start_elem, &end_elem, env, syntax)?;
        } else {
            match &start_elem {
                BracketElem::SbChar(ch) => sbcset.set(*ch),
                BracketElem::MbChar(wc) => mbcset.mbchars.push(*wc),
                BracketElem::EquivClass(name) | BracketElem::CollSym(name) => {
                    add_single_char(&mut sbcset, &mut mbcset, name, env)?
                }
                BracketElem::CharClass(name) => {
                    build_charclass(&mut sbcset, Some(&mut mbcset), name, env, syntax)?
                }
            }
        }
        if token.ty == PTokenType::EndOfRe {
            return Err(RegErrcode::EBrack);
        }
        if token.ty == PTokenType::CloseBracket {
            break;
        }
    }
    regexp.skip_bytes(token_len);

    if non_match {
        sbcset.invert();
    }
    if env.mb_cur_max > 1 {
        sbcset.mask(&BitSet::ascii());
    }

    let need_complex = env.mb_cur_max > 1
        && (!mbcset.mbchars.is_empty()
            || !mbcset.ranges.is_empty()
            || !mbcset.char_classes.is_empty()
            || mbcset.non_match);
    if need_complex {
        env.has_mb_node = true;
        let complex = env
            .tree
            .create_tree(None, None, TokenType::ComplexBracket(Box::new(mbcset)))?;
        if sbcset.is_empty() {
            return Ok(complex);
        }
        let simple = env
            .tree
            .create_tree(None, None, TokenType::SimpleBracket(Box::new(sbcset)))?;
        env.tree.create_tree(Some(simple), Some(complex), TokenType::Alt)
    } else {
        env.tree
            .create_tree(None, None, TokenType::SimpleBracket(Box::new(sbcset)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encodings::{ENCODING_ASCII, ENCODING_UTF8};
    use crate::regex::{RE_SYNTAX_POSIX_BASIC, RE_SYNTAX_POSIX_EXTENDED};
    use crate::restring::ViewOptions;

    fn parse_with(pattern: &[u8], syntax: Syntax) -> Result<ParseEnv<'static>, RegErrcode> {
        let mut env = ParseEnv::new(syntax, &ENCODING_ASCII, None);
        let mut view = ReString::construct(pattern, ViewOptions::new(&ENCODING_ASCII))?;
        parse(&mut view, &mut env)?;
        Ok(env)
    }

    fn ere(pattern: &str) -> Result<ParseEnv<'static>, RegErrcode> {
        parse_with(pattern.as_bytes(), RE_SYNTAX_POSIX_EXTENDED)
    }

    fn bre(pattern: &str) -> Result<ParseEnv<'static>, RegErrcode> {
        parse_with(pattern.as_bytes(), RE_SYNTAX_POSIX_BASIC)
    }

    fn err(r: Result<ParseEnv<'static>, RegErrcode>) -> RegErrcode {
        match r {
            Ok(_) => RegErrcode::NoError,
            Err(e) => e,
        }
    }

    #[test]
    fn counts_groups() {
        assert_eq!(ere("(a)(b(c))").unwrap().re_nsub, 3);
        assert_eq!(bre("\\(a\\)(b)").unwrap().re_nsub, 1);
    }

    #[test]
    fn paren_errors() {
        assert_eq!(err(ere("(ab")), RegErrcode::EParen);
        assert_eq!(err(bre("\\(ab")), RegErrcode::EParen);
        assert_eq!(err(bre("ab\\)")), RegErrcode::ERParen);
        // Unmatched ')' is ordinary in ERE.
        assert!(ere("ab)").is_ok());
    }

    #[test]
    fn bracket_errors() {
        assert_eq!(err(ere("[abc")), RegErrcode::EBrack);
        assert_eq!(err(ere("[[:nope:]]")), RegErrcode::ECtype);
        assert_eq!(err(ere("[z-a]")), RegErrcode::ERange);
        assert_eq!(err(ere("[[.ab.]]")), RegErrcode::ECollate);
        assert_eq!(err(ere("[[:alpha:]-z]")), RegErrcode::ERange);
        assert!(ere("[]a]").is_ok());
        assert!(ere("[a-]").is_ok());
        assert!(ere("[[=a=][.-.]]").is_ok());
    }

    #[test]
    fn interval_errors() {
        assert_eq!(err(ere("a{1,0}")), RegErrcode::EBracket);
        assert_eq!(err(ere("a{1")), RegErrcode::EBrace);
        assert_eq!(err(ere("a{1x}")), RegErrcode::BadBr);
        assert_eq!(err(ere("a{}")), RegErrcode::BadBr);
        assert_eq!(err(ere("a{40000}")), RegErrcode::ESize);
        assert!(ere("a{,3}").is_ok());
        assert!(parse_with(b"a{1", RE_SYNTAX_POSIX_EXTENDED | Syntax::INVALID_INTERVAL_ORD).is_ok());
    }

    #[test]
    fn repetition_errors() {
        assert_eq!(err(ere("a|*b")), RegErrcode::NoError);
        assert_eq!(err(bre("a**")), RegErrcode::BadRpt);
        assert_eq!(err(bre("\\{1\\}")), RegErrcode::BadRpt);
        assert_eq!(
            err(parse_with(b"*a", crate::regex::RE_SYNTAX_POSIX_MINIMAL_EXTENDED)),
            RegErrcode::BadRpt
        );
        // A leading '*' is literal in BRE.
        assert!(bre("*a").is_ok());
    }

    #[test]
    fn escapes() {
        assert_eq!(err(ere("ab\\")), RegErrcode::EEscape);
        assert_eq!(err(ere("(a)\\2")), RegErrcode::ESubreg);
        assert_eq!(err(ere("(a\\1)")), RegErrcode::ESubreg);
        let env = ere("(a)\\1").unwrap();
        assert_eq!(env.nbackref, 1);
        assert_eq!(env.used_bkref_map, 1);
    }

    #[test]
    fn word_ops_flag() {
        assert!(ere("\\bfoo\\>").unwrap().word_ops_used);
        assert!(!ere("foo\\w").unwrap().word_ops_used);
        assert!(!parse_with(b"\\<", RE_SYNTAX_POSIX_EXTENDED | Syntax::NO_GNU_OPS)
            .unwrap()
            .word_ops_used);
    }

    #[test]
    fn lazy_suffix_sets_policy() {
        assert_eq!(ere("a+?b*").unwrap().fl_longest_match, LongestMatch::Shortest);
        assert_eq!(ere("a+b*?").unwrap().fl_longest_match, LongestMatch::Longest);
        assert_eq!(ere("ab").unwrap().fl_longest_match, LongestMatch::Unknown);
        assert_eq!(bre("a*\\?").unwrap().fl_longest_match, LongestMatch::Shortest);
        let awk = crate::regex::RE_SYNTAX_POSIX_AWK;
        assert_eq!(
            parse_with(b"a*?", awk).unwrap().fl_longest_match,
            LongestMatch::Longest
        );
    }

    #[test]
    fn utf8_bracket_builds_complex_node() {
        let mut env = ParseEnv::new(RE_SYNTAX_POSIX_EXTENDED, &ENCODING_UTF8, None);
        let pat = "[aé]".as_bytes();
        let mut view = ReString::construct(pat, ViewOptions::new(&ENCODING_UTF8)).unwrap();
        parse(&mut view, &mut env).unwrap();
        assert!(env.has_mb_node);
    }
}
