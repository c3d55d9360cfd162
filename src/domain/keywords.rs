use serde::Deserialize;

/// One relevance-rank bucket of search terms. Lower rank means the group
/// is searched earlier and its matches count as more relevant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KeywordGroup {
    pub rank: u32,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    /// One group per keyword, ranked 1..=n in list order. This is how the
    /// umich and idealist searches treat their flat keyword lists.
    pub fn singles(keywords: &[String]) -> Vec<KeywordGroup> {
        keywords
            .iter()
            .enumerate()
            .map(|(i, kw)| KeywordGroup {
                rank: i as u32 + 1,
                keywords: vec![kw.clone()],
            })
            .collect()
    }

    /// Orders profile-supplied groups ascending by rank.
    pub fn ranked(mut groups: Vec<KeywordGroup>) -> Vec<KeywordGroup> {
        groups.sort_by_key(|group| group.rank);
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::KeywordGroup;

    #[test]
    fn singles_rank_in_list_order() {
        let groups = KeywordGroup::singles(&["R".to_string(), "Python".to_string()]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].rank, 1);
        assert_eq!(groups[0].keywords, vec!["R"]);
        assert_eq!(groups[1].rank, 2);
    }

    #[test]
    fn ranked_sorts_ascending() {
        let groups = KeywordGroup::ranked(vec![
            KeywordGroup {
                rank: 3,
                keywords: vec!["c".to_string()],
            },
            KeywordGroup {
                rank: 1,
                keywords: vec!["a".to_string()],
            },
        ]);

        assert_eq!(groups[0].rank, 1);
        assert_eq!(groups[1].rank, 3);
    }
}
