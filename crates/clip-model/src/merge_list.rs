//! Merge-list parsing.
//!
//! Groups are separated by `;`, entries within a group by `,`. An entry is
//! either a 1-based marker pair number or an inclusive range `a-b`, which
//! counts down when `a > b`: `"1-3,7;5-3"` yields `[1,2,3,7]` and `[5,4,3]`.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// One merged output: its label (the group text) and ordered clip numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeGroup {
    pub label: String,
    pub indices: Vec<usize>,
}

/// Parse a merge list into ordered groups. Empty groups are ignored.
pub fn parse_merge_list(list: &str) -> Result<Vec<MergeGroup>, ModelError> {
    let mut groups = Vec::new();
    for group in list.split(';') {
        let label = group.trim();
        if label.is_empty() {
            continue;
        }

        let mut indices = Vec::new();
        for token in label.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            expand_token(token, &mut indices)?;
        }

        if !indices.is_empty() {
            groups.push(MergeGroup {
                label: label.to_string(),
                indices,
            });
        }
    }
    Ok(groups)
}

fn expand_token(token: &str, out: &mut Vec<usize>) -> Result<(), ModelError> {
    match token.split_once('-') {
        Some((from, to)) => {
            let from = parse_pair_number(from, token)?;
            let to = parse_pair_number(to, token)?;
            if from <= to {
                out.extend(from..=to);
            } else {
                out.extend((to..=from).rev());
            }
        }
        None => out.push(parse_pair_number(token, token)?),
    }
    Ok(())
}

fn parse_pair_number(raw: &str, token: &str) -> Result<usize, ModelError> {
    let n = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| ModelError::InvalidMergeToken {
            token: token.to_string(),
            message: format!("'{}' is not a marker pair number", raw.trim()),
        })?;
    if n == 0 {
        return Err(ModelError::InvalidMergeToken {
            token: token.to_string(),
            message: "marker pair numbers start at 1".to_string(),
        });
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn indices(list: &str) -> Vec<Vec<usize>> {
        parse_merge_list(list)
            .unwrap()
            .into_iter()
            .map(|g| g.indices)
            .collect()
    }

    #[test]
    fn test_range_and_single() {
        assert_eq!(indices("1-3,7"), vec![vec![1, 2, 3, 7]]);
    }

    #[test]
    fn test_descending_range() {
        assert_eq!(indices("5-3"), vec![vec![5, 4, 3]]);
    }

    #[test]
    fn test_multiple_groups_keep_labels() {
        let groups = parse_merge_list("2;4-5").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "2");
        assert_eq!(groups[0].indices, vec![2]);
        assert_eq!(groups[1].label, "4-5");
        assert_eq!(groups[1].indices, vec![4, 5]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(parse_merge_list("").unwrap().is_empty());
        assert_eq!(indices(" 1 , 2 ;; 3 "), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_rejects_bad_tokens() {
        assert!(parse_merge_list("1,x").is_err());
        assert!(parse_merge_list("0-2").is_err());
        assert!(parse_merge_list("-3").is_err());
        assert!(parse_merge_list("1-2-3").is_err());
    }

    proptest! {
        #[test]
        fn prop_range_is_inclusive_and_monotone(a in 1usize..200, b in 1usize..200) {
            let got = indices(&format!("{a}-{b}"));
            let group = &got[0];
            prop_assert_eq!(group.len(), a.abs_diff(b) + 1);
            prop_assert_eq!(group[0], a);
            prop_assert_eq!(*group.last().unwrap(), b);
            for pair in group.windows(2) {
                prop_assert_eq!(pair[0].abs_diff(pair[1]), 1);
            }
        }
    }
}
