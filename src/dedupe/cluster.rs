use serde::{Deserialize, Serialize};

use crate::dedupe::signature::{identity_signature, signature_similarity, DedupeAlgorithm};
use crate::record::Record;

/// A group of input records considered duplicates of its seed.
///
/// `members` are indices into the clustered slice, in input order; the
/// first is the seed. Membership is decided against the seed only, so two
/// non-seed members are not guaranteed to be similar to each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCluster {
    pub members: Vec<usize>,

    /// The seed's signature; `None` for records without one.
    pub signature: Option<String>,
}

impl DuplicateCluster {
    /// Index of the seed record; `None` for a cluster with no members.
    #[must_use]
    pub fn seed(&self) -> Option<usize> {
        self.members.first().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True if the cluster holds more than one record.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.members.len() > 1
    }
}

/// Greedy seed-based clustering.
///
/// Records are visited in input order. Each unassigned record seeds a new
/// cluster and claims every later unassigned record whose similarity to the
/// seed reaches `threshold`. Under [`DedupeAlgorithm::Exact`] only identical
/// signatures cluster, whatever the threshold. Records without a signature
/// are always singletons.
///
/// Runs in O(n²) signature comparisons.
#[must_use]
pub fn cluster_records(
    records: &[Record],
    identity: &[String],
    algorithm: DedupeAlgorithm,
    threshold: f64,
) -> Vec<DuplicateCluster> {
    let signatures: Vec<Option<String>> = records
        .iter()
        .map(|r| identity_signature(r, identity))
        .collect();

    let mut assigned = vec![false; records.len()];
    let mut clusters = Vec::new();

    for seed in 0..records.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut members = vec![seed];

        if let Some(seed_sig) = signatures[seed].as_deref() {
            for candidate in (seed + 1)..records.len() {
                if assigned[candidate] {
                    continue;
                }
                let Some(sig) = signatures[candidate].as_deref() else {
                    continue;
                };
                let joins = match algorithm {
                    DedupeAlgorithm::Exact => seed_sig == sig,
                    DedupeAlgorithm::Fuzzy => {
                        signature_similarity(seed_sig, sig, algorithm) >= threshold
                    }
                };
                if joins {
                    assigned[candidate] = true;
                    members.push(candidate);
                }
            }
        }

        clusters.push(DuplicateCluster {
            members,
            signature: signatures[seed].clone(),
        });
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSchema;
    use crate::observation::Observation;
    use chrono::Utc;

    fn named(id: &str, name: &str) -> Record {
        Record::builder(id)
            .observe("name", Observation::new(name, ContextSchema::new(), Utc::now()))
            .build()
            .unwrap()
    }

    fn identity() -> Vec<String> {
        vec!["name".to_string()]
    }

    fn member_lists(clusters: &[DuplicateCluster]) -> Vec<Vec<usize>> {
        clusters.iter().map(|c| c.members.clone()).collect()
    }

    #[test]
    fn test_exact_clusters_identical_signatures() {
        let records = vec![
            named("1", "Acme"),
            named("2", "Globex"),
            named("3", " acme "),
            named("4", "Initech"),
        ];
        let clusters = cluster_records(&records, &identity(), DedupeAlgorithm::Exact, 0.85);
        assert_eq!(member_lists(&clusters), vec![vec![0, 2], vec![1], vec![3]]);
        assert_eq!(clusters[0].signature.as_deref(), Some("acme"));
    }

    #[test]
    fn test_exact_ignores_threshold() {
        let records = vec![named("1", "Acme"), named("2", "acme")];
        for threshold in [0.0, 0.5, 1.0, 2.0] {
            let clusters = cluster_records(&records, &identity(), DedupeAlgorithm::Exact, threshold);
            assert_eq!(member_lists(&clusters), vec![vec![0, 1]]);
        }

        let different = vec![named("1", "Acme"), named("2", "Globex")];
        let clusters = cluster_records(&different, &identity(), DedupeAlgorithm::Exact, 0.0);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_records_without_signature_are_singletons() {
        let records = vec![named("1", ""), named("2", ""), named("3", "Acme")];
        let clusters = cluster_records(&records, &identity(), DedupeAlgorithm::Fuzzy, 0.0);
        assert_eq!(member_lists(&clusters), vec![vec![0], vec![1], vec![2]]);
        assert!(clusters[0].signature.is_none());
    }

    #[test]
    fn test_fuzzy_threshold() {
        let records = vec![named("1", "acme corp berlin"), named("2", "acme corp munich")];
        // Jaccard = 2 / 4.
        let loose = cluster_records(&records, &identity(), DedupeAlgorithm::Fuzzy, 0.5);
        assert_eq!(loose.len(), 1);
        let tight = cluster_records(&records, &identity(), DedupeAlgorithm::Fuzzy, 0.51);
        assert_eq!(tight.len(), 2);
    }

    // Clustering is seed-based and not transitive: members are compared to
    // the seed only, so two members of one cluster may fall below the
    // threshold against each other.
    #[test]
    fn test_cluster_members_not_pairwise_similar() {
        let records = vec![
            named("seed", "a b c d"),
            named("left", "a b c x"),
            named("right", "b c d y"),
        ];
        let clusters = cluster_records(&records, &identity(), DedupeAlgorithm::Fuzzy, 0.6);
        assert_eq!(member_lists(&clusters), vec![vec![0, 1, 2]]);

        let left_right = signature_similarity("a b c x", "b c d y", DedupeAlgorithm::Fuzzy);
        assert!(left_right < 0.6);
    }

    #[test]
    fn test_assigned_records_do_not_seed() {
        // "2" joins seed "1"; "3" is close to "2" but not to "1", and must
        // start its own cluster rather than follow "2".
        let records = vec![
            named("1", "a b c d"),
            named("2", "a b c e"),
            named("3", "a b e f"),
        ];
        let clusters = cluster_records(&records, &identity(), DedupeAlgorithm::Fuzzy, 0.6);
        assert_eq!(member_lists(&clusters), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_seed_of_deserialized_empty_cluster() {
        let empty: DuplicateCluster =
            serde_json::from_str(r#"{ "members": [], "signature": null }"#).unwrap();
        assert_eq!(empty.seed(), None);
        assert!(empty.is_empty());

        let clusters = cluster_records(&[named("1", "Acme"), named("2", "acme")], &identity(), DedupeAlgorithm::Exact, 0.85);
        assert_eq!(clusters[0].seed(), Some(0));
    }
}
