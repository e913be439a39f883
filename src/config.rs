use serde::{Deserialize, Serialize};

/// Run configuration, read from `super40.toml`.
///
/// Every pipeline call receives the pieces of this it needs; nothing is kept
/// in process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub join_key: String,
    pub priority_columns: Vec<String>,
    pub group_column: String,
    pub excluded_groups: Vec<String>,
    pub total_quota: usize,
    pub top_k: usize,
    pub allocation: AllocationMode,
    pub rounding: Rounding,
    // sorted-group positions that receive the even-split remainder
    pub bonus_groups: Vec<usize>,
    pub exam_columns: Vec<String>,
    pub gat_exam_columns: Vec<String>,
    pub contact_columns: Vec<String>,
    // file-name markers used to group exports before merging
    pub grades: Vec<String>,
    pub exam_types: Vec<Vec<String>>,
    pub streams: Vec<String>,
    /// exports picked up under this keyword carry `gat_exam_columns`
    pub gat_keyword: String,
    pub rank_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,
    pub categories: Vec<ScoreCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationMode {
    #[serde(rename = "proportional")]
    Proportional,
    #[serde(rename = "even_split")]
    EvenSplit,
}

/// Tie-break for proportional shares that land exactly on `.5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rounding {
    #[serde(rename = "half_even")]
    HalfEven,
    #[serde(rename = "half_up")]
    HalfUp,
}

/// A family of repeated exam columns aggregated into one top-K total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCategory {
    pub name: String,
    pub marks_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_marks: Option<f64>,
}

impl ScoreCategory {
    fn keyed(name: &str, max_marks: f64) -> Self {
        Self {
            name: name.to_string(),
            marks_prefix: "Total Marks".to_string(),
            exam_prefix: Some("Exam".to_string()),
            exam_keyword: Some(name.to_string()),
            max_marks: Some(max_marks),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            join_key: "NAME".to_string(),
            priority_columns: strings(&[
                "ROLL NO.",
                "NAME",
                "BATCH",
                "CLASS",
                "ADMISSION DONE BY",
                "DOJ",
            ]),
            group_column: "CLASS".to_string(),
            excluded_groups: strings(&["XI- JEE/NEET"]),
            total_quota: 40,
            top_k: 4,
            allocation: AllocationMode::Proportional,
            rounding: Rounding::HalfEven,
            bonus_groups: vec![0, 1, 2, 4],
            exam_columns: strings(&["Exam", "Total Marks"]),
            gat_exam_columns: strings(&["Exam", "ENGLISH", "GAT"]),
            contact_columns: strings(&[
                "Name",
                "Student Contact No.",
                "Father/Guardian Contact No.",
                "Mother/Guardian Contact No.",
            ]),
            grades: strings(&["11TH", "12TH"]),
            exam_types: vec![strings(&["GAT", "MATHS", "MHTCET"]), strings(&["JEE"]), strings(&["NEET"])],
            streams: strings(&["JEE", "NEET"]),
            gat_keyword: "GAT".to_string(),
            rank_by: "Average Score".to_string(),
            output_directory: Some("output".to_string()),
            categories: vec![
                ScoreCategory::keyed("GAT", 1200.0),
                ScoreCategory::keyed("MATHS", 752.0),
                ScoreCategory {
                    name: "Subjective".to_string(),
                    marks_prefix: "Subjective Marks".to_string(),
                    exam_prefix: None,
                    exam_keyword: None,
                    max_marks: Some(100.0),
                },
            ],
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    /// Columns to carry from an export matched by `keyword`.
    pub fn exam_columns_for(&self, keyword: &str) -> &[String] {
        if keyword.to_uppercase().contains(&self.gat_keyword.to_uppercase()) {
            &self.gat_exam_columns
        } else {
            &self.exam_columns
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.join_key.trim().is_empty() {
            return Err(crate::ReconcileError::Config("join_key is empty".into()));
        }
        if self.group_column.trim().is_empty() {
            return Err(crate::ReconcileError::Config("group_column is empty".into()));
        }
        if self.top_k == 0 {
            return Err(crate::ReconcileError::Config("top_k must be at least 1".into()));
        }
        if self.exam_types.iter().any(|keywords| keywords.is_empty()) {
            return Err(crate::ReconcileError::Config("exam_types has an empty keyword group".into()));
        }
        Ok(())
    }
}
