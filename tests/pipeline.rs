use std::collections::BTreeMap;
use std::fs;
use super40::config::{AllocationMode, Rounding, ScoreCategory};
use super40::catalog;
use super40::merge::{self, ExamMerger};
use super40::quota::{allocate_quotas, AllocationStrategy};
use super40::reader::TableReader;
use super40::{report, Config, Super40Analyzer};
use tempfile::tempdir;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn names(table: &super40::Table, column: &str) -> Vec<String> {
    table.rows().iter().map(|r| r.display(column)).collect()
}

#[test]
fn roster_merge_from_csv_files() {
    let dir = tempdir().unwrap();
    let roster = dir.path().join("roster.csv");
    let fees = dir.path().join("fees.csv");
    fs::write(
        &roster,
        "Fees Paid,NAME,ROLL NO.,CLASS\nyes,Priya  Shah,11,XI-A\nno,Arjun Rao,12,XI-B\n",
    )
    .unwrap();
    fs::write(
        &fees,
        "name,Mother No,Class\npriyashah,98200,XI-Z\nARJUN RAO,98300,XI-Z\narjun rao,98399,XI-Z\n",
    )
    .unwrap();

    let reader = TableReader::new();
    let primary = reader.read_file(&roster).unwrap();
    let secondary = reader.read_file(&fees).unwrap();
    let config = Config::default();
    let merged = merge::merge(&primary, &secondary, &config.join_key, &config.priority_columns).unwrap();

    assert_eq!(
        merged.headers(),
        &strings(&["ROLL NO.", "NAME", "CLASS", "Mother No", "Fees Paid"])
    );
    assert_eq!(names(&merged, "NAME"), strings(&["Priya  Shah", "Arjun Rao"]));
    assert_eq!(names(&merged, "Mother No"), strings(&["98200", "98399"]));
    // the roster's class is authoritative
    assert_eq!(names(&merged, "CLASS"), strings(&["XI-A", "XI-B"]));

    let out = dir.path().join("merged.csv");
    report::write_csv(&merged, &out).unwrap();
    let written = fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("ROLL NO.,NAME,CLASS,Mother No,Fees Paid\n"));
    assert!(written.contains("12,Arjun Rao,XI-B,98399,no"));
}

#[test]
fn exam_exports_to_super40() {
    let reader = TableReader::new();
    let gat1 = reader
        .read_str(
            "11TH_GAT_1.csv",
            "Name,Exam,ENGLISH,GAT,Total Marks\n\
             Asha,GAT 1,10,20,30/40\n\
             Bilal,GAT 1,8,12,20/40\n\
             Chen,GAT 1,9,18,27/40\n\
             Dev,GAT 1,5,10,15/40\n",
        )
        .unwrap();
    let maths1 = reader
        .read_str(
            "11TH_MATHS_1.csv",
            "Name,Exam,Total Marks\n\
             asha,MATHS 1,40\n\
             Bilal,MATHS 1,45\n\
             chen,MATHS 1,\n\
             Esha,MATHS 1,38\n",
        )
        .unwrap();
    let classes = reader
        .read_str(
            "classes.csv",
            "NAME,CLASS\nAsha,XI-A\nBilal,XI-A\nChen,XI-B\nDev,XI-B\nEsha,XI- JEE/NEET\n",
        )
        .unwrap();

    let config = Config {
        join_key: "Name".to_string(),
        total_quota: 2,
        top_k: 4,
        allocation: AllocationMode::Proportional,
        rounding: Rounding::HalfEven,
        categories: vec![
            ScoreCategory {
                name: "GAT".into(),
                marks_prefix: "Total Marks".into(),
                exam_prefix: Some("Exam".into()),
                exam_keyword: Some("GAT".into()),
                max_marks: None,
            },
            ScoreCategory {
                name: "MATHS".into(),
                marks_prefix: "Total Marks".into(),
                exam_prefix: Some("Exam".into()),
                exam_keyword: Some("MATHS".into()),
                max_marks: None,
            },
        ],
        ..Config::default()
    };

    // Total Marks only; the GAT export's extra columns are not asked for here
    let mut merger = ExamMerger::new(&config.join_key);
    merger.add(&gat1, &config.exam_columns).unwrap();
    merger.add(&maths1, &config.exam_columns).unwrap();
    let exams = merger.finish("exams");
    assert_eq!(
        exams.headers(),
        &strings(&["Name", "Exam1", "Total Marks1", "Exam2", "Total Marks2"])
    );
    assert_eq!(exams.len(), 5);

    // CLASS is a priority column, which is only ever taken from the primary side,
    // so this join runs without priorities
    let unified = merge::merge(&exams, &classes, &config.join_key, &[]).unwrap();
    assert_eq!(unified.headers()[0], "CLASS");
    let analysis = Super40Analyzer::new(&config).analyze(&unified).unwrap();

    let scored = &analysis.scored;
    let asha = &scored.rows()[0];
    assert_eq!(asha.display("Total GAT (Top 4)"), "30");
    assert_eq!(asha.display("Total MATHS (Top 4)"), "40");
    assert_eq!(asha.display("Grand Total"), "70");
    assert_eq!(asha.display("Average Score"), "35");

    assert_eq!(names(&analysis.held_out, "Name"), strings(&["Esha"]));
    // XI-A (Asha 35, Bilal 32.5) and XI-B (Chen 13.5, Dev 7.5) get one seat each
    assert_eq!(names(&analysis.selection.selected, "Name"), strings(&["Asha", "Chen"]));
    assert_eq!(names(&analysis.selection.excluded, "Name"), strings(&["Bilal", "Dev"]));

    let dir = tempdir().unwrap();
    let written = report::write_selection(&analysis, &config, dir.path(), "11TH").unwrap();
    assert_eq!(written.len(), 4);
    let summary = fs::read_to_string(dir.path().join("11TH_summary.txt")).unwrap();
    assert!(summary.contains("Seats: 2 requested, 2 filled"));
    assert!(summary.contains("XI- JEE/NEET (1 students)"));
    let selected = fs::read_to_string(dir.path().join("11TH_super40_students.csv")).unwrap();
    assert_eq!(selected.lines().count(), 3);
}

#[test]
fn contacts_are_attached_from_a_directory() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("a.csv"),
        "Name,Student Contact No.,Father/Guardian Contact No.,Mother/Guardian Contact No.\nRia,1,2,3\n",
    )
    .unwrap();
    fs::write(dir.path().join("b.csv"), "Name,Phone\nRia,9\n").unwrap();
    fs::write(
        dir.path().join("c.csv"),
        "NAME,STUDENT CONTACT NO.,Father/Guardian Contact No.,Mother/Guardian Contact No.\nria,10,20,30\n",
    )
    .unwrap();
    fs::write(dir.path().join("~$lock.csv"), "junk").unwrap();

    let reader = TableReader::new();
    let sources = reader.read_directory(dir.path()).unwrap();
    assert_eq!(sources.len(), 3);

    let config = Config::default();
    let contacts = merge::gather_contacts(&sources, &config.contact_columns, "Name").unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts.rows()[0].display("Student Contact No."), "10");

    let exams = reader.read_str("exams.csv", "Name,Total Marks1\nRia,50\nOm,40\n").unwrap();
    let all = merge::append_with_contacts(&[exams], &contacts, "Name").unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.rows()[0].display("Mother/Guardian Contact No."), "30");
    assert_eq!(all.rows()[1].display("Mother/Guardian Contact No."), "");
}

#[test]
fn join_completeness_over_noisy_names() {
    let reader = TableReader::new();
    let primary = reader
        .read_str("p.csv", "NAME,X\nJohn Smith,1\n john  smith ,2\nMary,3\nZoe,4\n")
        .unwrap();
    let secondary = reader
        .read_str("s.csv", "Name,Y\nJOHNSMITH,a\nmary,b\n")
        .unwrap();
    let merged = merge::merge(&primary, &secondary, "NAME", &[]).unwrap();

    assert_eq!(merged.len(), primary.len());
    assert_eq!(names(&merged, "X"), strings(&["1", "2", "3", "4"]));
    assert_eq!(names(&merged, "Y"), strings(&["a", "a", "b", ""]));
}

#[test]
fn quota_worked_cases() {
    let strategy = AllocationStrategy::Proportional {
        rounding: Rounding::HalfEven,
    };
    let sizes: BTreeMap<String, usize> = [("A", 10), ("B", 5), ("C", 5)]
        .iter()
        .map(|(g, n)| (g.to_string(), *n))
        .collect();
    let plan = allocate_quotas(&sizes, 16, &strategy);
    assert_eq!(plan.quota_for("A"), Some(8));
    assert_eq!(plan.quota_for("B"), Some(4));
    assert_eq!(plan.quota_for("C"), Some(4));

    let sizes: BTreeMap<String, usize> = [("A", 7), ("B", 3)]
        .iter()
        .map(|(g, n)| (g.to_string(), *n))
        .collect();
    let plan = allocate_quotas(&sizes, 5, &strategy);
    assert_eq!(plan.quota_for("A"), Some(3));
    assert_eq!(plan.quota_for("B"), Some(2));
}

#[test]
fn exam_folder_is_merged_per_group_then_appended() {
    let exams = tempdir().unwrap();
    let contacts_dir = tempdir().unwrap();
    let files = [
        ("11TH_GAT_1.csv", "Name,Exam,ENGLISH,GAT\nAsha,GAT 1,10,20\n"),
        ("11TH_MATHS_1.csv", "Name,Exam,Total Marks\nAsha,MATHS 1,40\n"),
        ("11TH_JEE_1.csv", "Name,Exam,Total Marks\nOm,JEE 1,120\nasha,JEE 1,80\n"),
        ("12TH_NEET_1.csv", "Name,Exam,Total Marks\nIra,NEET 1,500\n"),
    ];
    for (name, content) in files {
        fs::write(exams.path().join(name), content).unwrap();
    }
    fs::write(
        contacts_dir.path().join("contacts.csv"),
        "Name,Student Contact No.,Father/Guardian Contact No.,Mother/Guardian Contact No.\nom,1,2,3\n",
    )
    .unwrap();

    let config = Config {
        join_key: "Name".to_string(),
        ..Config::default()
    };
    let reader = TableReader::new();
    let paths = reader.list_directory(exams.path()).unwrap();
    let groups = catalog::group_exam_files(&paths, &config.grades, &config.exam_types);
    let merged = catalog::merge_groups(&groups, &reader, &config);
    let merged_names: Vec<&str> = merged.iter().map(|t| t.name()).collect();
    assert_eq!(
        merged_names,
        vec!["11TH_GAT_MATHS_MHTCET_merged", "11TH_JEE_merged", "12TH_NEET_merged"]
    );
    // every group restarts its numbering
    assert!(merged.iter().all(|t| t.has_column("Exam1")));

    let contacts = merge::gather_contacts(
        &reader.read_directory(contacts_dir.path()).unwrap(),
        &config.contact_columns,
        &config.join_key,
    )
    .unwrap();
    let all = merge::append_with_contacts(&merged, &contacts, &config.join_key).unwrap();

    // Asha appears in two groups; the later (JEE) row is kept
    assert_eq!(names(&all, "Name"), strings(&["Om", "asha", "Ira"]));
    assert_eq!(all.rows()[1].display("Total Marks1"), "80");
    assert_eq!(all.rows()[1].display("GAT1"), "");
    assert_eq!(all.rows()[0].display("Student Contact No."), "1");
    assert_eq!(all.headers().last().map(String::as_str), Some("Mother/Guardian Contact No."));
}
