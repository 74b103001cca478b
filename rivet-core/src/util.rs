/// Writes each value with `f`, putting `separator` between the ones that produced output.
pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Case insensitive (ASCII) prefix test.
pub fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|v| v.eq_ignore_ascii_case(prefix))
}

/// Replaces the `{0}`, `{1}`, ... placeholders of a SQL template.
pub fn fill_template(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        let mut buf = itoa::Buffer::new();
        let key = format!("{{{}}}", buf.format(i));
        result = result.replace(&key, arg);
    }
    result
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {{
        let query: &str = &$query;
        let end = (0..=::std::cmp::min(query.len(), 497))
            .rev()
            .find(|i| query.is_char_boundary(*i))
            .unwrap_or(0);
        format!(
            "{}{}",
            query[..end].trim_end(),
            if query.len() > end { "..." } else { "" },
        )
    }};
}
