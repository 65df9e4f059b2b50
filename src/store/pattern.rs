//! Glob matching for `KEYS` patterns.

/// Characters with a meaning inside a store glob pattern
const GLOB_SPECIAL: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Matches `key` against a store glob pattern.
///
/// Supports `*`, `?`, bracket classes (`[abc]`, `[a-z]`, `[^a]`) and
/// backslash escapes, the subset used for key listings. Runs in
/// `O(pattern * key)` time regardless of how many stars the pattern holds.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let tokens = tokenize(&pattern);
    let key: Vec<char> = key.chars().collect();

    let (mut t, mut k) = (0, 0);
    // Last star seen and the key position it is currently absorbing up to
    let mut resume: Option<(usize, usize)> = None;

    while k < key.len() {
        match tokens.get(t) {
            Some(Token::Star) => {
                resume = Some((t, k));
                t += 1;
            }
            Some(token) if token.matches(key[k]) => {
                t += 1;
                k += 1;
            }
            _ => match resume {
                Some((star, absorbed)) => {
                    t = star + 1;
                    k = absorbed + 1;
                    resume = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    tokens[t..].iter().all(|token| matches!(token, Token::Star))
}

/// Escapes glob metacharacters so `text` only matches itself.
pub fn escape_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if GLOB_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

enum Token {
    Literal(char),
    AnyChar,
    Star,
    Class(CharClass),
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Literal(literal) => *literal == c,
            Token::AnyChar => true,
            Token::Class(class) => class.matches(c),
            Token::Star => false,
        }
    }
}

fn tokenize(pattern: &[char]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut i = 0;
    while i < pattern.len() {
        match pattern[i] {
            '*' => {
                // Runs of stars match the same as one
                if !matches!(tokens.last(), Some(Token::Star)) {
                    tokens.push(Token::Star);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::AnyChar);
                i += 1;
            }
            '[' => match parse_class(&pattern[i + 1..]) {
                Some((class, consumed)) => {
                    tokens.push(Token::Class(class));
                    i += 1 + consumed;
                }
                None => {
                    tokens.push(Token::Literal('['));
                    i += 1;
                }
            },
            '\\' if i + 1 < pattern.len() => {
                tokens.push(Token::Literal(pattern[i + 1]));
                i += 2;
            }
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }
    tokens
}

struct CharClass {
    negated: bool,
    ranges: Vec<(char, char)>,
}

impl CharClass {
    fn matches(&self, c: char) -> bool {
        let hit = self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
        hit != self.negated
    }
}

/// Parses the body of a `[...]` class, returning it and the chars consumed
/// including the closing bracket. `None` if the class is unterminated.
fn parse_class(body: &[char]) -> Option<(CharClass, usize)> {
    let mut i = 0;
    let negated = body.first() == Some(&'^');
    if negated {
        i += 1;
    }
    let mut ranges = Vec::new();
    while i < body.len() {
        let c = match body[i] {
            ']' => return Some((CharClass { negated, ranges }, i + 1)),
            '\\' if i + 1 < body.len() => {
                i += 1;
                body[i]
            }
            c => c,
        };
        if i + 2 < body.len() && body[i + 1] == '-' && body[i + 2] != ']' {
            let (lo, hi) = if c <= body[i + 2] {
                (c, body[i + 2])
            } else {
                (body[i + 2], c)
            };
            ranges.push((lo, hi));
            i += 3;
        } else {
            ranges.push((c, c));
            i += 1;
        }
    }
    None
}
