pub mod mensa_parser;

/// All 'special' chars have to be escaped when using telegram markdown_v2.
pub fn escape_markdown_v2(input: &str) -> String {
    input
        .replace('.', r"\.")
        .replace('!', r"\!")
        .replace('+', r"\+")
        .replace('-', r"\-")
        .replace('<', r"\<")
        .replace('>', r"\>")
        .replace('(', r"\(")
        .replace(')', r"\)")
        .replace('=', r"\=")
        // workaround for html things not being properly decoded
        .replace("&amp;", "&")
        .replace("&nbsp;", " ")
}
