//! Statement text rewriting.
//!
//! Caller SQL uses `?` for positional parameters and `$$` for the table
//! prefix. Both are rewritten outside quoted literals and identifiers only.

/// Lexical state while scanning statement text.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

/// Walk `sql`, calling `code` for each char outside quotes and comments and
/// `other` for everything else.
fn scan(sql: &str, mut code: impl FnMut(char), mut other: impl FnMut(char)) {
    let mut state = Scan::Code;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match state {
            Scan::Code => match (c, next) {
                ('\'', _) => {
                    state = Scan::SingleQuoted;
                    other(c);
                }
                ('"', _) => {
                    state = Scan::DoubleQuoted;
                    other(c);
                }
                ('-', Some('-')) => {
                    state = Scan::LineComment;
                    other(c);
                }
                ('/', Some('*')) => {
                    state = Scan::BlockComment;
                    other(c);
                    other('*');
                    chars.next();
                }
                _ => code(c),
            },
            Scan::SingleQuoted => {
                other(c);
                if c == '\'' {
                    state = Scan::Code;
                }
            }
            Scan::DoubleQuoted => {
                other(c);
                if c == '"' {
                    state = Scan::Code;
                }
            }
            Scan::LineComment => {
                other(c);
                if c == '\n' {
                    state = Scan::Code;
                }
            }
            Scan::BlockComment => {
                other(c);
                if c == '*' && next == Some('/') {
                    other('/');
                    chars.next();
                    state = Scan::Code;
                }
            }
        }
    }
}

/// Replace every `$$` with `prefix`.
pub fn replace_table_prefix(sql: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(pos) = rest.find("$$") {
        out.push_str(&rest[..pos]);
        out.push_str(prefix);
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

/// Render each `?` outside quotes and comments with `placeholder(n)`,
/// numbering from 1.
pub fn rewrite_placeholders(sql: &str, placeholder: impl Fn(usize) -> String) -> String {
    let out = std::cell::RefCell::new(String::with_capacity(sql.len() + 8));
    let mut index = 0;
    scan(
        sql,
        |c| {
            if c == '?' {
                index += 1;
                out.borrow_mut().push_str(&placeholder(index));
            } else {
                out.borrow_mut().push(c);
            }
        },
        |c| out.borrow_mut().push(c),
    );
    out.into_inner()
}

/// Count `?` placeholders outside quotes and comments.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    scan(
        sql,
        |c| {
            if c == '?' {
                count += 1;
            }
        },
        |_| {},
    );
    count
}

/// Split a script into statements on `;` outside quotes and comments.
///
/// Empty statements and comment-only statements are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let statements = std::cell::RefCell::new(Vec::new());
    let current = std::cell::RefCell::new(String::new());
    let has_code = std::cell::Cell::new(false);

    let flush = || {
        let stmt = current.borrow().trim().to_string();
        if has_code.get() && !stmt.is_empty() {
            statements.borrow_mut().push(stmt);
        }
        current.borrow_mut().clear();
        has_code.set(false);
    };

    scan(
        script,
        |c| {
            if c == ';' {
                flush();
            } else {
                if !c.is_whitespace() {
                    has_code.set(true);
                }
                current.borrow_mut().push(c);
            }
        },
        |c| {
            let mut cur = current.borrow_mut();
            if c == '\'' || c == '"' {
                has_code.set(true);
            }
            cur.push(c);
        },
    );
    flush();
    statements.into_inner()
}
