//! Risk level bookkeeping for one matrix.

use std::collections::{HashMap, HashSet};

use crate::error::MatrixError;
use crate::matrix::{CellLevelRow, LevelProjection, RiskLevelDraft, RiskLevelView};

/// Map each client-local level id to its position in `levels`.
pub fn build_index(levels: &[RiskLevelDraft]) -> Result<HashMap<&str, usize>, MatrixError> {
    let mut index = HashMap::with_capacity(levels.len());
    for (position, level) in levels.iter().enumerate() {
        if index.insert(level.client_id.as_str(), position).is_some() {
            return Err(MatrixError::DuplicateLevelId {
                id: level.client_id.clone(),
            });
        }
    }
    Ok(index)
}

/// Collapse joined cell rows into the distinct levels they reference, in
/// first-seen order.
pub fn collapse(rows: &[CellLevelRow], projection: LevelProjection) -> Vec<RiskLevelView> {
    let mut seen = HashSet::new();
    let mut levels = Vec::new();

    for row in rows {
        if !seen.insert(row.cell_type_id) {
            continue;
        }
        let label = match projection {
            LevelProjection::Full => row.label.clone(),
            LevelProjection::Summary => None,
        };
        levels.push(RiskLevelView {
            id: row.cell_type_id.to_string(),
            label,
            color: row.color.clone(),
        });
    }

    levels
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{build_index, collapse};
    use crate::error::MatrixError;
    use crate::matrix::{CellCoord, CellLevelRow, LevelProjection, RiskLevelDraft, RiskLevelView};

    fn draft(id: &str) -> RiskLevelDraft {
        RiskLevelDraft {
            client_id: id.to_string(),
            label: format!("label {id}"),
            color: "red".to_string(),
            icon: None,
        }
    }

    fn row(x: u32, y: u32, id: i64, label: &str, color: &str) -> CellLevelRow {
        CellLevelRow {
            coord: CellCoord::new(x, y),
            cell_type_id: id,
            label: Some(label.to_string()),
            color: color.to_string(),
        }
    }

    #[test]
    fn build_index_tracks_positions_for_arbitrary_ids() {
        let levels = vec![draft("low"), draft("1700000000000"), draft("")];
        let index = build_index(&levels).expect("unique ids");
        assert_eq!(index.get("low"), Some(&0));
        assert_eq!(index.get("1700000000000"), Some(&1));
        assert_eq!(index.get(""), Some(&2));
    }

    #[test]
    fn build_index_rejects_duplicate_ids() {
        let levels = vec![draft("a"), draft("b"), draft("a")];
        let err = build_index(&levels).expect_err("duplicate id");
        assert!(matches!(err, MatrixError::DuplicateLevelId { ref id } if id == "a"));
    }

    #[test]
    fn collapse_keeps_first_seen_order_and_dedupes() {
        let rows = vec![
            row(1, 1, 7, "High", "red"),
            row(1, 2, 3, "Low", "green"),
            row(2, 1, 7, "High", "red"),
            row(2, 2, 3, "Low", "green"),
        ];

        assert_eq!(
            collapse(&rows, LevelProjection::Full),
            vec![
                RiskLevelView {
                    id: "7".to_string(),
                    label: Some("High".to_string()),
                    color: "red".to_string(),
                },
                RiskLevelView {
                    id: "3".to_string(),
                    label: Some("Low".to_string()),
                    color: "green".to_string(),
                },
            ]
        );
    }

    #[test]
    fn summary_projection_drops_labels() {
        let rows = vec![row(1, 1, 7, "High", "red")];
        let levels = collapse(&rows, LevelProjection::Summary);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].label, None);
        assert_eq!(levels[0].color, "red");
    }

    #[test]
    fn collapse_of_no_rows_is_empty() {
        assert!(collapse(&[], LevelProjection::Full).is_empty());
    }
}
