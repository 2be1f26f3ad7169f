//! Bulk alternating key/value arguments.

use crate::error::{Error, Result};

/// Group `k0, v0, k1, v1, ...` into pairs. An odd-length list is rejected
/// before anything is consumed by a container.
pub(crate) fn pair_up<T, I>(items: I) -> Result<Vec<(T, T)>>
where
    I: IntoIterator<Item = T>,
{
    let mut it = items.into_iter();
    let mut out = Vec::with_capacity(it.size_hint().0 / 2);
    while let Some(k) = it.next() {
        match it.next() {
            Some(v) => out.push((k, v)),
            None => {
                return Err(Error::invalid(format!(
                    "alternating key/value list has a dangling key after {} pairs",
                    out.len()
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_even_lists() {
        assert_eq!(pair_up(vec![1, 2, 3, 4]), Ok(vec![(1, 2), (3, 4)]));
        assert_eq!(pair_up(Vec::<i32>::new()), Ok(vec![]));
    }

    #[test]
    fn rejects_odd_lists() {
        assert!(matches!(
            pair_up(vec![1, 2, 3]),
            Err(Error::InvalidArgument(_))
        ));
    }
}
