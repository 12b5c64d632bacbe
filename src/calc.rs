use crate::model::{ExamSettings, ExamType, StudentRow, UnitAssessment, UnitColumns, UnitId};
use serde::Serialize;

const RATIO_TOLERANCE: f64 = 0.01;

/// Grade shown in a row's grade column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradeDisplay {
    Band(f64),
    /// Forced by an incomplete ("ร") alert.
    Incomplete,
    /// Forced by a fail ("0") alert.
    Fail,
}

impl Default for GradeDisplay {
    fn default() -> Self {
        GradeDisplay::Band(0.0)
    }
}

impl GradeDisplay {
    pub fn text(&self) -> String {
        match self {
            GradeDisplay::Band(g) => format_score(*g),
            GradeDisplay::Incomplete => "ร".to_string(),
            GradeDisplay::Fail => "0".to_string(),
        }
    }

    /// Zero bands and overrides render in the danger style.
    pub fn is_danger(&self) -> bool {
        match self {
            GradeDisplay::Band(g) => *g == 0.0,
            GradeDisplay::Incomplete | GradeDisplay::Fail => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowTotals {
    pub collected: f64,
    pub total: f64,
    pub percentage: f64,
    pub unit_subtotals: Vec<(UnitId, f64)>,
    pub grade: GradeDisplay,
}

impl RowTotals {
    pub fn unit_subtotal(&self, unit: UnitId) -> f64 {
        self.unit_subtotals
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }
}

pub fn grade_for_percentage(pct: f64) -> f64 {
    if pct >= 80.0 {
        4.0
    } else if pct >= 75.0 {
        3.5
    } else if pct >= 70.0 {
        3.0
    } else if pct >= 65.0 {
        2.5
    } else if pct >= 60.0 {
        2.0
    } else if pct >= 55.0 {
        1.5
    } else if pct >= 50.0 {
        1.0
    } else {
        0.0
    }
}

/// Recomputes a row from its current cells. Empty cells count as zero.
pub fn row_totals(row: &StudentRow, units: &[UnitColumns], exams: &ExamSettings) -> RowTotals {
    let mut unit_subtotals = Vec::with_capacity(units.len());
    let mut collected = 0.0;
    for unit in units {
        let sum: f64 = unit
            .items
            .iter()
            .map(|i| row.score(i.id).unwrap_or(0.0))
            .sum();
        unit_subtotals.push((unit.unit_id, sum));
        collected += sum;
    }

    let mut total = collected;
    for exam in [ExamType::Midterm, ExamType::Final] {
        if exams.enabled(exam) {
            total += row.exam(exam).unwrap_or(0.0);
        }
    }

    let grand_max = if exams.grand_max > 0.0 {
        exams.grand_max
    } else {
        100.0
    };
    let percentage = total / grand_max * 100.0;

    let grade = if row.alerts.has_incomplete() {
        GradeDisplay::Incomplete
    } else if row.alerts.has_fail() {
        GradeDisplay::Fail
    } else {
        GradeDisplay::Band(grade_for_percentage(percentage))
    };

    RowTotals {
        collected,
        total,
        percentage,
        unit_subtotals,
        grade,
    }
}

/// Two decimals, with a trailing `.00` dropped.
pub fn format_score(v: f64) -> String {
    let s = format!("{:.2}", v);
    match s.strip_suffix(".00") {
        Some(whole) if whole == "-0" => "0".to_string(),
        Some(whole) => whole.to_string(),
        None => s,
    }
}

pub fn format_percentage(pct: f64) -> String {
    format!("{}%", pct.round() as i64)
}

/// Most frequent non-empty value; ties go to the value seen first.
pub fn mode<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    for v in values.into_iter().flatten() {
        if v.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(seen, _)| *seen == v) {
            Some((_, n)) => *n += 1,
            None => counts.push((v, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (v, n) in counts {
        match best {
            Some((_, b)) if b >= n => {}
            _ => best = Some((v, n)),
        }
    }
    best.map(|(v, _)| v.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioTarget {
    pub mid: i64,
    #[serde(rename = "final")]
    pub final_ratio: i64,
}

impl Default for RatioTarget {
    fn default() -> Self {
        RatioTarget {
            mid: 80,
            final_ratio: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RatioError {
    #[error("ratio parts must be between 0 and 100")]
    OutOfRange,
    #[error("ratio parts must add up to 100")]
    BadSum,
}

impl RatioTarget {
    pub fn new(mid: i64, final_ratio: i64) -> Result<Self, RatioError> {
        if !(0..=100).contains(&mid) || !(0..=100).contains(&final_ratio) {
            return Err(RatioError::OutOfRange);
        }
        if mid + final_ratio != 100 {
            return Err(RatioError::BadSum);
        }
        Ok(RatioTarget { mid, final_ratio })
    }

    /// Final part is derived so the pair always sums to 100.
    pub fn from_mid(mid: i64) -> Result<Self, RatioError> {
        Self::new(mid, 100 - mid)
    }

    pub fn display(&self) -> String {
        format!("{} : {}", self.mid, self.final_ratio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatioStatus {
    OnTarget,
    /// Mid-period score is above the target by this many points.
    Surplus(f64),
    /// Mid-period score is short of the target by this many points.
    Deficit(f64),
    Pending,
}

impl RatioStatus {
    pub fn kind(&self) -> &'static str {
        match self {
            RatioStatus::OnTarget => "onTarget",
            RatioStatus::Surplus(_) => "surplus",
            RatioStatus::Deficit(_) => "deficit",
            RatioStatus::Pending => "pending",
        }
    }

    pub fn points(&self) -> Option<f64> {
        match self {
            RatioStatus::Surplus(v) | RatioStatus::Deficit(v) => Some(*v),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            RatioStatus::OnTarget => "ตรงตามเป้าหมาย".to_string(),
            RatioStatus::Surplus(v) => format!("ระหว่างภาคเกิน {} คะแนน", format_score(*v)),
            RatioStatus::Deficit(v) => format!("ระหว่างภาคขาด {} คะแนน", format_score(*v)),
            RatioStatus::Pending => "รอคะแนนปลายภาค".to_string(),
        }
    }
}

/// Points the mid-period score must move to hit `target` with the final-period score fixed.
pub fn ratio_status(mid_score: f64, final_score: f64, target: RatioTarget) -> RatioStatus {
    if final_score <= 0.0 || target.final_ratio == 0 {
        return RatioStatus::Pending;
    }
    let ideal_mid = final_score * target.mid as f64 / target.final_ratio as f64;
    // Compared at score precision so a gap of exactly one hundredth counts as on target.
    let needed = ((ideal_mid - mid_score) * 100.0).round() / 100.0;
    if needed.abs() <= RATIO_TOLERANCE {
        RatioStatus::OnTarget
    } else if needed < 0.0 {
        RatioStatus::Surplus(needed.abs())
    } else {
        RatioStatus::Deficit(needed)
    }
}

pub fn actual_ratio(mid_score: f64, final_score: f64) -> String {
    let total = mid_score + final_score;
    if total > 0.0 {
        let mid = (mid_score / total * 100.0).round() as i64;
        format!("{} : {}", mid, 100 - mid)
    } else {
        "-- : --".to_string()
    }
}

/// `(คาบที่ a-b)` labels for units in order; empty for units without hours.
pub fn cumulative_periods(hours: &[(UnitId, i64)]) -> Vec<(UnitId, String)> {
    let mut running = 0i64;
    hours
        .iter()
        .map(|(unit, h)| {
            if *h > 0 {
                let start = running + 1;
                running += h;
                (*unit, format!("(คาบที่ {}-{})", start, running))
            } else {
                (*unit, String::new())
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPanel {
    pub collected: f64,
    pub midterm: f64,
    pub final_score: f64,
    pub total: f64,
    pub show_midterm: bool,
    pub show_final: bool,
    pub show_ratio: bool,
    pub actual_ratio: String,
    pub target_ratio: Option<String>,
    pub status: Option<String>,
    pub message: Option<String>,
    pub points: Option<f64>,
}

/// Mid period is collected plus midterm; final period is the final exams alone.
pub fn summary_panel(units: &[UnitAssessment], target: Option<RatioTarget>) -> SummaryPanel {
    let collected: f64 = units.iter().map(|u| u.collected_max).sum();
    let midterm: f64 = units.iter().map(|u| u.midterm.effective()).sum();
    let final_score: f64 = units.iter().map(|u| u.final_exam.effective()).sum();
    let show_midterm = units.iter().any(|u| u.midterm.enabled);
    let show_final = units.iter().any(|u| u.final_exam.enabled);

    let mid_period = collected + midterm;
    let status = target.map(|t| ratio_status(mid_period, final_score, t));

    SummaryPanel {
        collected,
        midterm,
        final_score,
        total: mid_period + final_score,
        show_midterm,
        show_final,
        show_ratio: show_midterm || show_final,
        actual_ratio: actual_ratio(mid_period, final_score),
        target_ratio: target.map(|t| t.display()),
        status: status.map(|s| s.kind().to_string()),
        message: status.map(|s| s.message()),
        points: status.and_then(|s| s.points()),
    }
}
