use std::fmt;

use serde::Serialize;
use sumdex_types::{optional_hex, CatalogRecord, Digest, NamespacedRecord};

/// A match in a local catalog. Displays as `digest<TAB>path`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LocalHit {
    pub digest: Option<Digest>,
    pub path: String,
}

impl From<CatalogRecord> for LocalHit {
    fn from(record: CatalogRecord) -> Self {
        Self {
            digest: record.digest,
            path: record.path,
        }
    }
}

impl fmt::Display for LocalHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", optional_hex(self.digest.as_ref()), self.path)
    }
}

/// A match in the central store. Displays as `digest<TAB>namespace<TAB>path`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CentralHit {
    pub digest: Option<Digest>,
    pub namespace: String,
    pub path: String,
}

impl From<NamespacedRecord> for CentralHit {
    fn from(record: NamespacedRecord) -> Self {
        Self {
            digest: record.record.digest,
            namespace: record.namespace,
            path: record.record.path,
        }
    }
}

impl fmt::Display for CentralHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}",
            optional_hex(self.digest.as_ref()),
            self.namespace,
            self.path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HI: &str = "8f434346648f6b96df89dda901c5176b10a6d83961dd3c1ac88b59b2dc327aa4";

    #[test]
    fn tab_separated_lines() {
        let digest = Digest::from_hex(HI).unwrap();
        let local = LocalHit {
            digest: Some(digest),
            path: "a.txt".into(),
        };
        assert_eq!(local.to_string(), format!("{HI}\ta.txt"));

        let central = CentralHit {
            digest: Some(digest),
            namespace: "h1".into(),
            path: "a.txt".into(),
        };
        assert_eq!(central.to_string(), format!("{HI}\th1\ta.txt"));
    }

    #[test]
    fn missing_digest_prints_empty_column() {
        let hit = LocalHit {
            digest: None,
            path: "pending".into(),
        };
        assert_eq!(hit.to_string(), "\tpending");
    }

    #[test]
    fn json_uses_hex_digest() {
        let hit = CentralHit {
            digest: Some(Digest::from_hex(HI).unwrap()),
            namespace: "h1".into(),
            path: "a.txt".into(),
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["digest"], HI);
        assert_eq!(json["namespace"], "h1");
    }
}
