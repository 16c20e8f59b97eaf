//! Version string ordering in the style of GNU `sort -V`.

use std::cmp::Ordering;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A run of either digits or non-digits inside a version string.
#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Number(&'a str),
    Text(&'a str),
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Compares two version strings the way `sort -V` does.
///
/// Digit runs are compared numerically and everything else byte-wise, so `10` sorts after `9`
/// and `6.11.0-3-generic` sorts after `6.8.0-45-generic`. Arbitrarily long digit runs are
/// supported.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l, r) {
                    (Chunk::Number(l), Chunk::Number(r)) => compare_numeric(l, r),
                    (Chunk::Text(l), Chunk::Text(r)) => l.cmp(r),
                    (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
                };

                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// Returns the greatest version according to [`compare_versions`].
pub fn latest_version<I, S>(versions: I) -> Option<S>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    versions
        .into_iter()
        .max_by(|a, b| compare_versions(a.as_ref(), b.as_ref()))
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn chunks(version: &str) -> impl Iterator<Item = Chunk<'_>> {
    let mut rest = version;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(if is_digit {
            Chunk::Number(chunk)
        } else {
            Chunk::Text(chunk)
        })
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
