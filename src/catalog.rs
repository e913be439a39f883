//! Sorts exports into the groups they are merged or combined in, going by the
//! markers in their file names: grade (`11TH`), exam type (`GAT`, `JEE`) and
//! stream (`JEE`, `NEET`). Matching is case-insensitive.

use crate::config::Config;
use crate::merge::ExamMerger;
use crate::models::Table;
use crate::reader::TableReader;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Category for files that carry no grade marker.
pub const UNGROUPED: &str = "OTHER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamFile {
    pub path: PathBuf,
    /// the exam-type keyword the file was picked up by
    pub keyword: String,
}

/// The exports of one grade and one exam-type group, merged into one table
/// with its own `Exam1`, `Exam2`, ... numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamGroup {
    pub grade: String,
    pub keywords: Vec<String>,
    pub files: Vec<ExamFile>,
}

impl ExamGroup {
    /// `11TH_GAT_MATHS_MHTCET`
    pub fn label(&self) -> String {
        format!("{}_{}", self.grade, self.keywords.join("_")).to_uppercase()
    }
}

fn marker_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_uppercase())
        .unwrap_or_default()
}

/// Groups exam exports by grade, then by exam-type keyword group.
///
/// Within a group files come keyword by keyword, each keyword's files in the
/// order given. A file matching several keywords of one group is taken once,
/// under the first. Groups without files are left out.
pub fn group_exam_files(paths: &[PathBuf], grades: &[String], exam_types: &[Vec<String>]) -> Vec<ExamGroup> {
    let mut groups = Vec::new();
    for grade in grades {
        let grade_files: Vec<&PathBuf> = paths
            .iter()
            .filter(|p| marker_name(p).contains(&grade.to_uppercase()))
            .collect();

        for keywords in exam_types {
            let mut files: Vec<ExamFile> = Vec::new();
            for keyword in keywords {
                for path in &grade_files {
                    let taken = files.iter().any(|f| &f.path == *path);
                    if !taken && marker_name(path).contains(&keyword.to_uppercase()) {
                        files.push(ExamFile {
                            path: path.to_path_buf(),
                            keyword: keyword.clone(),
                        });
                    }
                }
            }
            if !files.is_empty() {
                groups.push(ExamGroup {
                    grade: grade.clone(),
                    keywords: keywords.clone(),
                    files,
                });
            }
        }
    }
    groups
}

/// Merges one group's exports. Files that cannot be read or lack the join
/// key are logged and skipped; `None` when nothing could be merged.
pub fn merge_group(group: &ExamGroup, reader: &TableReader, config: &Config) -> Option<Table> {
    let mut merger = ExamMerger::new(&config.join_key);
    for file in &group.files {
        let columns = config.exam_columns_for(&file.keyword);
        match reader.read_file(&file.path).and_then(|table| merger.add(&table, columns)) {
            Ok(index) => info!("{}: {} merged as exam #{}", group.label(), file.path.display(), index),
            Err(e) => warn!("{}: skipping {}: {}", group.label(), file.path.display(), e),
        }
    }

    if merger.is_empty() {
        warn!("no data found for {}", group.label());
        return None;
    }
    Some(merger.finish(&format!("{}_merged", group.label())))
}

pub fn merge_groups(groups: &[ExamGroup], reader: &TableReader, config: &Config) -> Vec<Table> {
    groups
        .iter()
        .filter_map(|group| merge_group(group, reader, config))
        .collect()
}

/// Buckets exports for combining: `<grade>_<stream>` when both markers are
/// present, `<grade>` with only a grade, [`UNGROUPED`] otherwise. The first
/// matching grade and stream win.
pub fn categorize_files(paths: &[PathBuf], grades: &[String], streams: &[String]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        let name = marker_name(path);
        let grade = grades.iter().find(|g| name.contains(&g.to_uppercase()));
        let stream = streams.iter().find(|s| name.contains(&s.to_uppercase()));
        let category = match (grade, stream) {
            (Some(grade), Some(stream)) => format!("{}_{}", grade, stream),
            (Some(grade), None) => grade.clone(),
            (None, _) => UNGROUPED.to_string(),
        };
        categories.entry(category).or_default().push(path.clone());
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn file_names(group: &ExamGroup) -> Vec<String> {
        group
            .files
            .iter()
            .map(|f| f.path.display().to_string())
            .collect()
    }

    #[test]
    fn exam_files_group_by_grade_and_exam_type() {
        let config = Config::default();
        let files = paths(&[
            "11th_maths_2.csv",
            "11TH_GAT_1.xlsx",
            "12TH_JEE_1.csv",
            "11TH_NEET_1.csv",
            "11TH_MHTCET_1.csv",
            "11TH_GAT_MATHS_combo.csv",
            "notes.csv",
        ]);
        let groups = group_exam_files(&files, &config.grades, &config.exam_types);

        let labels: Vec<String> = groups.iter().map(ExamGroup::label).collect();
        assert_eq!(labels, strings(&["11TH_GAT_MATHS_MHTCET", "11TH_NEET", "12TH_JEE"]));
        assert_eq!(
            file_names(&groups[0]),
            strings(&["11TH_GAT_1.xlsx", "11TH_GAT_MATHS_combo.csv", "11th_maths_2.csv", "11TH_MHTCET_1.csv"])
        );
        assert_eq!(groups[0].files[1].keyword, "GAT");
        assert_eq!(groups[0].files[2].keyword, "MATHS");
    }

    #[test]
    fn combine_categories_follow_grade_and_stream() {
        let config = Config::default();
        let files = paths(&["11TH_JEE_a.csv", "11TH_b.csv", "12TH_NEET_c.xlsx", "11TH_JEE_d.csv", "misc.csv"]);
        let categories = categorize_files(&files, &config.grades, &config.streams);

        assert_eq!(
            categories.keys().cloned().collect::<Vec<_>>(),
            strings(&["11TH", "11TH_JEE", "12TH_NEET", UNGROUPED])
        );
        assert_eq!(categories["11TH_JEE"], paths(&["11TH_JEE_a.csv", "11TH_JEE_d.csv"]));
        assert_eq!(categories[UNGROUPED], paths(&["misc.csv"]));
    }

    #[test]
    fn each_group_is_merged_with_its_own_numbering() {
        let dir = tempdir().unwrap();
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        };
        let files = vec![
            write("11TH_GAT_1.csv", "Name,Exam,ENGLISH,GAT,Total Marks\nAsha,GAT 1,10,20,30\n"),
            write("11TH_MATHS_1.csv", "Name,Exam,Total Marks\nAsha,MATHS 1,40\nDev,MATHS 1,35\n"),
            write("11TH_JEE_1.csv", "Name,Exam,Total Marks\nOm,JEE 1,120\n"),
            write("11TH_JEE_2.csv", "Student,Exam,Total Marks\nOm,JEE 2,99\n"),
        ];
        let config = Config {
            join_key: "Name".to_string(),
            ..Config::default()
        };
        let groups = group_exam_files(&files, &config.grades, &config.exam_types);
        let tables = merge_groups(&groups, &TableReader::new(), &config);

        assert_eq!(tables.len(), 2);
        let gat = &tables[0];
        assert_eq!(gat.name(), "11TH_GAT_MATHS_MHTCET_merged");
        assert_eq!(
            gat.headers(),
            &strings(&["Name", "Exam1", "ENGLISH1", "GAT1", "Exam2", "Total Marks2"])
        );
        assert_eq!(gat.len(), 2);

        // the second JEE export has no Name column and is skipped
        let jee = &tables[1];
        assert_eq!(jee.headers(), &strings(&["Name", "Exam1", "Total Marks1"]));
        assert_eq!(jee.rows()[0].display("Total Marks1"), "120");
    }

    #[test]
    fn a_group_without_readable_files_yields_nothing() {
        let group = ExamGroup {
            grade: "12TH".to_string(),
            keywords: strings(&["NEET"]),
            files: vec![ExamFile {
                path: PathBuf::from("/nonexistent/12TH_NEET_1.csv"),
                keyword: "NEET".to_string(),
            }],
        };
        assert!(merge_group(&group, &TableReader::new(), &Config::default()).is_none());
    }
}
