//! The four fixed report kinds and their per-kind layout descriptors.
//!
//! Each kind maps to one destination table, one upload filename, one sheet
//! layout and one set of forced-identifier columns. Keeping all of that in a
//! single exhaustive enum means a new kind (or a changed layout) is a
//! one-place edit instead of scattered string comparisons.

pub mod columns;
pub mod sheet;

pub use columns::{CellValue, ColumnClass, ColumnClassifier};
pub use sheet::{SheetData, read_grid, read_sheet};

/// Marker text whose presence in any cell ends the data region of a
/// structured-layout sheet ("purchasing unit" footer block).
pub const SENTINEL_MARKER: &str = "进货单位";

/// File extensions accepted for ingestion.
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["xls", "xlsx"];

/// Coarse destination column types, mapped to SQLite storage below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Decimal,
    Date,
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Decimal => "REAL",
            ColumnType::Date => "DATE",
        }
    }
}

/// How to locate the header row and data extent inside a raw grid.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// 0-indexed row holding the column names.
    pub header_row: usize,
    /// 0-indexed first data row.
    pub data_start: usize,
    /// Marker text ending the data region, scanned forward from `data_start`.
    pub sentinel: Option<&'static str>,
}

const SIMPLE_LAYOUT: Layout = Layout {
    header_row: 0,
    data_start: 1,
    sentinel: None,
};

/// Activity-plan sheets carry two banner rows above the header and a footer
/// block introduced by the sentinel marker.
const STRUCTURED_LAYOUT: Layout = Layout {
    header_row: 2,
    data_start: 4,
    sentinel: Some(SENTINEL_MARKER),
};

/// One of the four fixed report sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    CustomerRedemptionDetails,
    CustomerFlow,
    ActivityPlan,
    OutputResults,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::CustomerRedemptionDetails,
        ReportKind::CustomerFlow,
        ReportKind::ActivityPlan,
        ReportKind::OutputResults,
    ];

    /// Destination table name in the store.
    pub fn table_name(&self) -> &'static str {
        match self {
            ReportKind::CustomerRedemptionDetails => "customer_redemption_details",
            ReportKind::CustomerFlow => "customer_flow",
            ReportKind::ActivityPlan => "activity_plan",
            ReportKind::OutputResults => "output_results",
        }
    }

    /// Well-known upload filename (without extension) for this kind.
    pub fn file_stem(&self) -> &'static str {
        match self {
            ReportKind::CustomerRedemptionDetails => "客户原始兑付明细",
            ReportKind::CustomerFlow => "客户流向",
            ReportKind::ActivityPlan => "活动方案",
            ReportKind::OutputResults => "输出结果",
        }
    }

    /// Resolve a kind from a table name. This is the allowlist gate for
    /// request-supplied table names: anything else never reaches SQL text.
    pub fn from_table_name(name: &str) -> Option<ReportKind> {
        ReportKind::ALL.iter().copied().find(|k| k.table_name() == name)
    }

    /// Resolve a kind from an upload filename's base name.
    pub fn from_file_stem(stem: &str) -> Option<ReportKind> {
        ReportKind::ALL.iter().copied().find(|k| k.file_stem() == stem)
    }

    pub fn layout(&self) -> Layout {
        match self {
            ReportKind::ActivityPlan => STRUCTURED_LAYOUT,
            ReportKind::CustomerRedemptionDetails
            | ReportKind::CustomerFlow
            | ReportKind::OutputResults => SIMPLE_LAYOUT,
        }
    }

    /// Columns that must stay opaque text for this kind even though their
    /// content looks numeric (codes with leading zeros, mixed-format batch
    /// numbers, price strings). Overrides the name-based heuristic.
    pub fn forced_identifier_columns(&self) -> &'static [&'static str] {
        match self {
            ReportKind::CustomerRedemptionDetails => &["流入方编码"],
            ReportKind::CustomerFlow => &["物料编码", "流出方编码", "出库单价", "批次", "金额"],
            ReportKind::ActivityPlan => &["流入方编码"],
            ReportKind::OutputResults => &["物料编码", "流出方编码", "批次"],
        }
    }

    /// Declared destination schema, excluding the surrogate `id` and the
    /// period-key column which every table carries.
    pub fn schema(&self) -> &'static [(&'static str, ColumnType)] {
        match self {
            ReportKind::CustomerRedemptionDetails => &[
                ("客户名称", ColumnType::Text),
                ("流入方编码", ColumnType::Text),
                ("产品名称", ColumnType::Text),
                ("规格", ColumnType::Text),
                ("数量", ColumnType::Integer),
                ("供货价", ColumnType::Decimal),
                ("结算金额", ColumnType::Decimal),
                ("兑付日期", ColumnType::Date),
                ("备注", ColumnType::Text),
            ],
            ReportKind::CustomerFlow => &[
                ("流出方编码", ColumnType::Text),
                ("流出方名称", ColumnType::Text),
                ("流入方编码", ColumnType::Text),
                ("流入方名称", ColumnType::Text),
                ("物料编码", ColumnType::Text),
                ("产品名称", ColumnType::Text),
                ("规格", ColumnType::Text),
                ("批次", ColumnType::Text),
                ("数量", ColumnType::Integer),
                ("出库单价", ColumnType::Text),
                ("金额", ColumnType::Text),
                ("销售日期", ColumnType::Date),
            ],
            ReportKind::ActivityPlan => &[
                ("活动名称", ColumnType::Text),
                ("流入方编码", ColumnType::Text),
                ("客户名称", ColumnType::Text),
                ("产品名称", ColumnType::Text),
                ("规格", ColumnType::Text),
                ("数量", ColumnType::Integer),
                ("供货价", ColumnType::Decimal),
                ("建议零售价", ColumnType::Decimal),
                ("活动日期", ColumnType::Date),
                ("备注", ColumnType::Text),
            ],
            ReportKind::OutputResults => &[
                ("物料编码", ColumnType::Text),
                ("流出方编码", ColumnType::Text),
                ("客户名称", ColumnType::Text),
                ("产品名称", ColumnType::Text),
                ("规格", ColumnType::Text),
                ("批次", ColumnType::Text),
                ("数量", ColumnType::Integer),
                ("销售金额", ColumnType::Decimal),
                ("结算金额", ColumnType::Decimal),
                ("备注", ColumnType::Text),
            ],
        }
    }
}
