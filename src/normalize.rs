use std::borrow::Cow;

const GLYPHS: [char; 4] = ['^', '×', '÷', '√'];

/// Rewrites display glyphs into the tokens the parser understands:
/// `^` → `**`, `×` → `*`, `÷` → `/` and `√` → a `sqrt(` call prefix.
///
/// Text without any glyph is returned as is, so normalizing twice is the
/// same as normalizing once.
pub fn normalize(input: &str) -> Cow<'_, str> {
    if !input.contains(GLYPHS) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '^' => out.push_str("**"),
            '×' => out.push('*'),
            '÷' => out.push('/'),
            '√' => {
                let opens_call = chars.clone().find(|c| !c.is_whitespace()) == Some('(');
                out.push_str(if opens_call { "sqrt" } else { "sqrt(" });
            }
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
