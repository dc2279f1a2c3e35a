use crate::model::models::{Aggregation, DistrictComparisonType, DistrictDetailType, Metric, MetricPointType, MonthlyRecordType, SummaryOutputType, format_period, round2};

/**
 * Summarises a window of monthly records.
 *
 * # Arguments
 * `district`: The district the records belong to.
 * `records`: The window, newest first.
 *
 * # Returns
 * Totals of the flow figures, latest values of the stock figures and means of the rates.
 */
#[allow(clippy::cast_precision_loss)]
pub fn summarize(district: DistrictDetailType, records: &[MonthlyRecordType]) -> SummaryOutputType {
    let month_count = records.len();
    let mean = |value: fn(&MonthlyRecordType) -> f64| if month_count == 0 { 0.0 } else { round2(records.iter().map(value).sum::<f64>() / month_count as f64) };
    SummaryOutputType {
        district,
        month_count: i64::try_from(month_count).unwrap_or(i64::MAX),
        first_period: records.last().map(|record| format_period(record.year, record.month)),
        last_period: records.first().map(|record| format_period(record.year, record.month)),
        households_registered: records.first().map_or(0, |record| record.households_registered),
        total_households_work_provided: records.iter().map(|record| record.households_work_provided).sum(),
        total_persondays: records.iter().map(|record| record.total_persondays).sum(),
        total_wages_paid: round2(records.iter().map(|record| record.wages_paid).sum()),
        avg_women_participation_pct: mean(|record| record.women_participation_pct),
        avg_wage: mean(|record| record.avg_wage),
        total_works_completed: records.iter().map(|record| record.works_completed).sum(),
        works_ongoing: records.first().map_or(0, |record| record.works_ongoing),
    }
}

/**
 * Combines the monthly values of a metric into one value.
 *
 * # Arguments
 * `metric`: The metric to aggregate.
 * `records`: The window, newest first.
 */
#[allow(clippy::cast_precision_loss)]
pub fn aggregate(metric: Metric, records: &[MonthlyRecordType]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    match metric.aggregation() {
        Aggregation::Sum => round2(records.iter().map(|record| record.metric_value(metric)).sum()),
        Aggregation::Average => round2(records.iter().map(|record| record.metric_value(metric)).sum::<f64>() / records.len() as f64),
        Aggregation::Latest => records[0].metric_value(metric),
    }
}

/**
 * Builds the comparison entry of one district.
 *
 * # Arguments
 * `district`: The district.
 * `metric`: The compared metric.
 * `records`: The window, newest first.
 */
pub fn compare_district(district: &DistrictDetailType, metric: Metric, records: &[MonthlyRecordType]) -> DistrictComparisonType {
    let series = records.iter().rev().map(|record| MetricPointType { period: format_period(record.year, record.month), value: record.metric_value(metric) }).collect();
    DistrictComparisonType { district_id: district.id, district_name: district.name.clone(), value: aggregate(metric, records), series }
}
