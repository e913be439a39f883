//! Splits a fixed number of seats across groups and fills them with each
//! group's best rows.

use crate::columns::require;
use crate::config::{AllocationMode, Config, Rounding};
use crate::error::Result;
use crate::models::{sort_rows_desc, Row, Table};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// How seats are divided between groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// `round(n_g / N * total)` per group, then one seat at a time is added to
    /// the smallest quota (or taken from the largest) until the sum is exact.
    Proportional { rounding: Rounding },
    /// `total / groups` each; the remainder goes one seat apiece to the
    /// groups at `bonus_groups` (positions in sorted group order), then to the
    /// remaining groups in order.
    EvenSplit { bonus_groups: Vec<usize> },
}

impl AllocationStrategy {
    pub fn from_config(config: &Config) -> Self {
        match config.allocation {
            AllocationMode::Proportional => AllocationStrategy::Proportional {
                rounding: config.rounding,
            },
            AllocationMode::EvenSplit => AllocationStrategy::EvenSplit {
                bonus_groups: config.bonus_groups.clone(),
            },
        }
    }
}

impl Default for AllocationStrategy {
    fn default() -> Self {
        AllocationStrategy::Proportional {
            rounding: Rounding::HalfEven,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuota {
    pub group: String,
    pub size: usize,
    /// seats the strategy asked for before clamping to `size`
    pub requested: usize,
    pub quota: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPlan {
    pub target: usize,
    pub groups: Vec<GroupQuota>,
}

impl QuotaPlan {
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.quota).sum()
    }

    /// Seats that could not be filled because groups ran out of members.
    pub fn shortfall(&self) -> usize {
        self.target.saturating_sub(self.total())
    }

    pub fn quota_for(&self, group: &str) -> Option<usize> {
        self.groups.iter().find(|g| g.group == group).map(|g| g.quota)
    }

    pub fn clamped_groups(&self) -> impl Iterator<Item = &GroupQuota> {
        self.groups.iter().filter(|g| g.requested > g.size)
    }
}

/// Computes a quota per group. Groups are visited in key order, which is also
/// the tie-break whenever two groups have equal quotas.
pub fn allocate_quotas(sizes: &BTreeMap<String, usize>, total: usize, strategy: &AllocationStrategy) -> QuotaPlan {
    let sizes: Vec<(&String, usize)> = sizes.iter().map(|(g, n)| (g, *n)).collect();

    let requested = match strategy {
        AllocationStrategy::Proportional { rounding } => proportional(&sizes, total, *rounding),
        AllocationStrategy::EvenSplit { bonus_groups } => even_split(sizes.len(), total, bonus_groups),
    };

    let groups: Vec<GroupQuota> = sizes
        .iter()
        .zip(requested)
        .map(|((group, size), requested)| GroupQuota {
            group: group.to_string(),
            size: *size,
            requested,
            quota: requested.min(*size),
        })
        .collect();

    let plan = QuotaPlan { target: total, groups };
    for clamped in plan.clamped_groups() {
        warn!(
            "group `{}` was allotted {} seats but has only {} members",
            clamped.group, clamped.requested, clamped.size
        );
    }
    if plan.shortfall() > 0 {
        warn!("{} of {} seats left unfilled", plan.shortfall(), total);
    }
    plan
}

fn proportional(sizes: &[(&String, usize)], total: usize, rounding: Rounding) -> Vec<usize> {
    let population: usize = sizes.iter().map(|(_, n)| n).sum();
    if population == 0 {
        return vec![0; sizes.len()];
    }

    let mut quotas: Vec<usize> = sizes
        .iter()
        .map(|(_, n)| round_ratio(*n as u128 * total as u128, population as u128, rounding))
        .collect();

    loop {
        let sum: usize = quotas.iter().sum();
        if sum == total {
            break;
        }
        if sum < total {
            // smallest quota among groups that still have members to give
            let pick = (0..quotas.len())
                .filter(|&i| quotas[i] < sizes[i].1)
                .min_by_key(|&i| quotas[i]);
            match pick {
                Some(i) => quotas[i] += 1,
                None => break,
            }
        } else {
            let pick = (0..quotas.len())
                .filter(|&i| quotas[i] > 0)
                .rev()
                .max_by_key(|&i| quotas[i]);
            match pick {
                Some(i) => quotas[i] -= 1,
                None => break,
            }
        }
    }
    debug!("proportional quotas: {:?}", quotas);
    quotas
}

/// `numerator / denominator` rounded to the nearest integer.
fn round_ratio(numerator: u128, denominator: u128, rounding: Rounding) -> usize {
    let quotient = numerator / denominator;
    let twice_remainder = 2 * (numerator % denominator);
    let rounded = if twice_remainder > denominator {
        quotient + 1
    } else if twice_remainder == denominator {
        match rounding {
            Rounding::HalfUp => quotient + 1,
            Rounding::HalfEven => quotient + quotient % 2,
        }
    } else {
        quotient
    };
    rounded as usize
}

fn even_split(group_count: usize, total: usize, bonus_groups: &[usize]) -> Vec<usize> {
    if group_count == 0 {
        return Vec::new();
    }
    let base = total / group_count;
    let extra = total % group_count;

    let mut order: Vec<usize> = Vec::with_capacity(group_count);
    for position in bonus_groups.iter().copied().chain(0..group_count) {
        if position < group_count && !order.contains(&position) {
            order.push(position);
        }
    }

    let mut quotas = vec![base; group_count];
    for &position in order.iter().take(extra) {
        quotas[position] += 1;
    }
    debug!("even-split quotas: {:?}", quotas);
    quotas
}

/// Splits a table by exact value of `group_column`. Every row lands in
/// exactly one group; groups come back in key order.
pub fn partition(table: &Table, group_column: &str) -> Result<BTreeMap<String, Table>> {
    let column = require(group_column, table)?;
    let mut buckets: BTreeMap<String, Vec<Row>> = BTreeMap::new();
    for row in table.rows() {
        buckets.entry(row.display(&column)).or_default().push(row.clone());
    }
    Ok(buckets
        .into_iter()
        .map(|(group, rows)| {
            let part = Table::new(group.clone(), table.headers().to_vec(), rows);
            (group, part)
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub plan: QuotaPlan,
    /// chosen rows, best first across all groups
    pub selected: Table,
    /// every row that was not chosen, best first
    pub excluded: Table,
}

impl Selection {
    /// Number of selected rows per group, in group order.
    pub fn counts(&self) -> Vec<(String, usize)> {
        self.plan
            .groups
            .iter()
            .map(|g| (g.group.clone(), g.quota.min(g.size)))
            .collect()
    }
}

/// Allocates `total` seats across `groups` and picks each group's top rows
/// by `score_column` (stable, so ties keep their original order).
pub fn allocate(
    groups: &BTreeMap<String, Table>,
    total: usize,
    strategy: &AllocationStrategy,
    score_column: &str,
) -> Selection {
    let sizes = groups.iter().map(|(g, t)| (g.clone(), t.len())).collect();
    let plan = allocate_quotas(&sizes, total, strategy);
    select_top(groups, plan, score_column)
}

pub fn select_top(groups: &BTreeMap<String, Table>, plan: QuotaPlan, score_column: &str) -> Selection {
    let headers = groups
        .values()
        .next()
        .map(|t| t.headers().to_vec())
        .unwrap_or_default();

    let mut selected = Vec::new();
    let mut excluded = Vec::new();
    for (group, table) in groups {
        let quota = plan.quota_for(group).unwrap_or(0);
        let mut rows = table.rows().to_vec();
        sort_rows_desc(&mut rows, score_column);
        let rest = rows.split_off(quota.min(rows.len()));
        debug!("group `{}`: {} selected, {} left out", group, rows.len(), rest.len());
        selected.extend(rows);
        excluded.extend(rest);
    }

    sort_rows_desc(&mut selected, score_column);
    sort_rows_desc(&mut excluded, score_column);
    info!(
        "selected {} of {} seats across {} groups",
        selected.len(),
        plan.target,
        plan.groups.len()
    );

    Selection {
        plan,
        selected: Table::new("selected", headers.clone(), selected),
        excluded: Table::new("excluded", headers, excluded),
    }
}
