//! Quote-aware splitting of one delimited text line into fields.

/// Splits lines on a delimiter, keeping quoted runs together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedRecordParser {
    pub delimiter: char,
    pub quote: Option<char>,
}

impl Default for DelimitedRecordParser {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: Some('"'),
        }
    }
}

impl DelimitedRecordParser {
    pub fn new(delimiter: char, quote: Option<char>) -> Self {
        Self { delimiter, quote }
    }

    pub fn parse(&self, line: &str) -> Vec<String> {
        split_record(line, self.delimiter, self.quote)
    }
}

/// Split `line` into fields.
///
/// A quote that appears before the next delimiter opens a field that runs to
/// the matching closing quote; delimiters inside it do not split. One char
/// after the closing quote (normally the delimiter) is skipped. Empty fields
/// between consecutive delimiters are kept. An unterminated quote takes the
/// rest of the line.
pub fn split_record(line: &str, delimiter: char, quote: Option<char>) -> Vec<String> {
    let Some(quote) = quote else {
        return line.split(delimiter).map(str::to_string).collect();
    };
    let mut next_quote = line.find(quote);
    if next_quote.is_none() {
        return line.split(delimiter).map(str::to_string).collect();
    }

    let mut fields = Vec::new();
    let mut start = 0;
    while start < line.len() {
        let next_delim = line[start..]
            .find(delimiter)
            .map_or(line.len(), |i| start + i);

        match next_quote {
            Some(open) if open <= next_delim => {
                let body = open + quote.len_utf8();
                let close = line[body..].find(quote).map(|i| body + i);
                match close {
                    Some(close) => {
                        fields.push(line[body..close].to_string());
                        let after = close + quote.len_utf8();
                        start = match line[after..].chars().next() {
                            Some(c) => after + c.len_utf8(),
                            None => after,
                        };
                        next_quote = line[start..].find(quote).map(|i| start + i);
                    }
                    None => {
                        fields.push(line[body..].to_string());
                        start = line.len();
                    }
                }
            }
            _ => {
                fields.push(line[start..next_delim].to_string());
                start = next_delim + delimiter.len_utf8();
            }
        }
    }
    fields
}
