use crate::columns::{category_columns, require, resolve};
use crate::config::Config;
use crate::error::Result;
use crate::models::{Cell, Table};
use crate::quota::{allocate, partition, AllocationStrategy, Selection};
use crate::score::{top_k_detail, TopKSum};
use tracing::{info, warn};

pub const GRAND_TOTAL: &str = "Grand Total";
pub const AVERAGE_SCORE: &str = "Average Score";
pub const PERCENTAGE: &str = "Percentage";

/// Score columns found for one category and the total column derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryColumns {
    pub category: String,
    pub score_columns: Vec<String>,
    pub total_column: String,
    pub percentage_column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Super40Analysis {
    /// the input plus every derived score column
    pub scored: Table,
    pub categories: Vec<CategoryColumns>,
    pub selection: Selection,
    /// rows of the excluded groups, best first; never considered for seats
    pub held_out: Table,
    /// score cells that could not be parsed and were treated as absent
    pub unparseable_cells: usize,
}

impl Super40Analysis {
    /// Columns worth showing in a summary: name, group and the derived scores.
    pub fn summary_columns(&self, config: &Config) -> Vec<String> {
        let mut columns = vec![config.join_key.clone(), config.group_column.clone()];
        for category in &self.categories {
            columns.push(category.total_column.clone());
        }
        for derived in [GRAND_TOTAL, AVERAGE_SCORE, PERCENTAGE] {
            if self.scored.has_column(derived) {
                columns.push(derived.to_string());
            }
        }
        columns
            .into_iter()
            .filter_map(|c| resolve(&c, self.scored.headers()).map(str::to_string))
            .collect()
    }
}

pub struct Super40Analyzer<'a> {
    config: &'a Config,
}

impl<'a> Super40Analyzer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Full run: derive score columns, hold out excluded groups, allocate the
    /// seats and pick each group's best.
    pub fn analyze(&self, unified: &Table) -> Result<Super40Analysis> {
        // Step 1: best-of-K totals, grand total, average and percentages
        let (scored, categories, unparseable_cells) = self.add_score_columns(unified)?;

        // Step 2: split off the groups that never compete
        let rank_column = require(&self.config.rank_by, &scored)?;
        let group_column = require(&self.config.group_column, &scored)?;
        let is_held_out = |value: &str| self.config.excluded_groups.iter().any(|g| g == value);

        let held_out = scored
            .filter(|row| is_held_out(&row.display(&group_column)))
            .sorted_desc_by(&rank_column)
            .renamed("held_out");
        let eligible = scored.filter(|row| !is_held_out(&row.display(&group_column)));
        info!(
            "{} rows eligible, {} held out ({:?})",
            eligible.len(),
            held_out.len(),
            self.config.excluded_groups
        );

        // Step 3: seats per group, then the top rows of each
        let groups = partition(&eligible, &group_column)?;
        let strategy = AllocationStrategy::from_config(self.config);
        let selection = allocate(&groups, self.config.total_quota, &strategy, &rank_column);

        Ok(Super40Analysis {
            scored,
            categories,
            selection,
            held_out,
            unparseable_cells,
        })
    }

    /// Appends the derived score columns. Existing columns are left alone.
    pub fn add_score_columns(&self, table: &Table) -> Result<(Table, Vec<CategoryColumns>, usize)> {
        let k = self.config.top_k;
        let mut scored = table.clone();
        let mut categories = Vec::new();
        let mut unparseable = 0;

        for category in &self.config.categories {
            let score_columns = category_columns(table, category)?;
            if score_columns.is_empty() {
                warn!("no score columns found for category {}", category.name);
            }

            let details: Vec<TopKSum> = table
                .rows()
                .iter()
                .map(|row| top_k_detail(row, &score_columns, k))
                .collect();
            unparseable += details.iter().map(|d| d.unparseable).sum::<usize>();

            let total_column = format!("Total {} (Top {})", category.name, k);
            let totals = details.iter().map(|d| Cell::Number(d.total)).collect();
            scored = scored.with_column_values(&total_column, totals);

            let percentage_column = match category.max_marks {
                Some(max) if max > 0.0 => {
                    let column = format!("{} Percentage", category.name);
                    let source = total_column.clone();
                    scored = scored.with_column(&column, |row| {
                        Cell::Number(row.get(&source).as_f64().unwrap_or(0.0) * 100.0 / max)
                    });
                    Some(column)
                }
                _ => None,
            };

            categories.push(CategoryColumns {
                category: category.name.clone(),
                score_columns,
                total_column,
                percentage_column,
            });
        }

        if unparseable > 0 {
            warn!("{} score cells could not be parsed and were counted as absent", unparseable);
        }
        if categories.is_empty() {
            return Ok((scored, categories, unparseable));
        }

        let totals: Vec<String> = categories.iter().map(|c| c.total_column.clone()).collect();
        let category_count = categories.len() as f64;
        scored = scored.with_column(GRAND_TOTAL, |row| {
            Cell::Number(totals.iter().filter_map(|c| row.get(c).as_f64()).sum())
        });
        scored = scored.with_column(AVERAGE_SCORE, |row| {
            Cell::Number(row.get(GRAND_TOTAL).as_f64().unwrap_or(0.0) / category_count)
        });

        let percentages: Option<Vec<String>> = categories.iter().map(|c| c.percentage_column.clone()).collect();
        if let Some(percentages) = percentages {
            scored = scored.with_column(PERCENTAGE, |row| {
                let sum: f64 = percentages.iter().filter_map(|c| row.get(c).as_f64()).sum();
                Cell::Number(sum / category_count)
            });
        }

        Ok((scored, categories, unparseable))
    }
}
