use chrono::{Datelike, NaiveDate};

use crate::model::models::{DistrictAddInputType, DistrictDetailType, MonthlyRecordUpsertType, round2};

pub const FALLBACK_STATE_CODE: &str = "09";
pub const FALLBACK_STATE_NAME: &str = "Uttar Pradesh";
pub const FALLBACK_ISO_CODE: &str = "IN-UP";

/**
 * Static description of a district with its typical monthly programme figures.
 */
pub struct FallbackDistrict {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub households_registered: i64,
    pub households_work_provided: i64,
    pub persondays: i64,
    pub avg_wage: f64,
    pub women_participation_pct: f64,
    pub works_completed: i64,
    pub works_ongoing: i64,
}

const FALLBACK_DISTRICTS: [FallbackDistrict; 10] = [
    FallbackDistrict { name: "Lucknow", latitude: 26.8467, longitude: 80.9462, households_registered: 245_000, households_work_provided: 38_500, persondays: 812_000, avg_wage: 237.0, women_participation_pct: 41.2, works_completed: 410, works_ongoing: 1_630 },
    FallbackDistrict { name: "Kanpur Nagar", latitude: 26.4499, longitude: 80.3319, households_registered: 198_000, households_work_provided: 31_200, persondays: 655_000, avg_wage: 237.0, women_participation_pct: 38.5, works_completed: 352, works_ongoing: 1_410 },
    FallbackDistrict { name: "Varanasi", latitude: 25.3176, longitude: 82.9739, households_registered: 276_000, households_work_provided: 44_800, persondays: 965_000, avg_wage: 237.0, women_participation_pct: 43.7, works_completed: 488, works_ongoing: 1_920 },
    FallbackDistrict { name: "Agra", latitude: 27.1767, longitude: 78.0081, households_registered: 231_000, households_work_provided: 35_900, persondays: 741_000, avg_wage: 237.0, women_participation_pct: 33.9, works_completed: 395, works_ongoing: 1_580 },
    FallbackDistrict { name: "Prayagraj", latitude: 25.4358, longitude: 81.8463, households_registered: 352_000, households_work_provided: 57_300, persondays: 1_240_000, avg_wage: 237.0, women_participation_pct: 45.1, works_completed: 602, works_ongoing: 2_340 },
    FallbackDistrict { name: "Gorakhpur", latitude: 26.7606, longitude: 83.3732, households_registered: 318_000, households_work_provided: 52_600, persondays: 1_118_000, avg_wage: 237.0, women_participation_pct: 40.3, works_completed: 571, works_ongoing: 2_210 },
    FallbackDistrict { name: "Meerut", latitude: 28.9845, longitude: 77.7064, households_registered: 142_000, households_work_provided: 19_800, persondays: 402_000, avg_wage: 237.0, women_participation_pct: 29.6, works_completed: 233, works_ongoing: 960 },
    FallbackDistrict { name: "Bareilly", latitude: 28.3670, longitude: 79.4304, households_registered: 264_000, households_work_provided: 40_100, persondays: 853_000, avg_wage: 237.0, women_participation_pct: 31.8, works_completed: 447, works_ongoing: 1_770 },
    FallbackDistrict { name: "Aligarh", latitude: 27.8974, longitude: 78.0880, households_registered: 219_000, households_work_provided: 33_400, persondays: 698_000, avg_wage: 237.0, women_participation_pct: 32.4, works_completed: 381, works_ongoing: 1_520 },
    FallbackDistrict { name: "Moradabad", latitude: 28.8386, longitude: 78.7733, households_registered: 187_000, households_work_provided: 27_700, persondays: 579_000, avg_wage: 237.0, women_participation_pct: 30.2, works_completed: 318, works_ongoing: 1_290 },
];

/**
 * Relative activity per calendar month. Work demand peaks in the lean season before the monsoon
 * and drops during sowing and harvest.
 */
const SEASONAL_FACTOR: [f64; 12] = [1.05, 1.12, 1.18, 1.22, 1.25, 1.08, 0.82, 0.74, 0.79, 0.88, 0.92, 0.97];

/**
 * The static district table.
 */
pub fn fallback_table() -> &'static [FallbackDistrict] {
    &FALLBACK_DISTRICTS
}

/**
 * The static district table as district details with ids 1..=10 in table order.
 */
pub fn fallback_districts() -> Vec<DistrictDetailType> {
    FALLBACK_DISTRICTS
        .iter()
        .zip(1_i64..)
        .map(|(district, id)| {
            DistrictDetailType::new(id, district.name.to_string(), FALLBACK_STATE_CODE.to_string(), FALLBACK_STATE_NAME.to_string(), district.latitude, district.longitude, FALLBACK_ISO_CODE.to_string())
        })
        .collect()
}

/**
 * The static district table as seed input.
 */
pub fn fallback_district_inputs() -> Vec<DistrictAddInputType> {
    FALLBACK_DISTRICTS
        .iter()
        .map(|district| DistrictAddInputType {
            name: district.name.to_string(),
            state_code: FALLBACK_STATE_CODE.to_string(),
            state_name: FALLBACK_STATE_NAME.to_string(),
            latitude: district.latitude,
            longitude: district.longitude,
            iso_code: FALLBACK_ISO_CODE.to_string(),
        })
        .collect()
}

/**
 * Generates deterministic sample records for a district.
 *
 * # Arguments
 * `district_id`: Database id of the district.
 * `baseline`: Typical figures of the district.
 * `months`: Number of months to generate.
 * `end`: Any day in the last month to generate.
 *
 * # Returns
 * The records in chronological order.
 */
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn generate_sample_records(district_id: i64, baseline: &FallbackDistrict, months: u32, end: NaiveDate) -> Vec<MonthlyRecordUpsertType> {
    let source_date = end.format("%Y-%m-%d").to_string();
    let mut records = Vec::with_capacity(months as usize);
    let end_index = i64::from(end.year()) * 12 + i64::from(end.month0());
    let months = i64::from(months);
    for offset in (0..months).rev() {
        let index = end_index - offset;
        let year = index.div_euclid(12);
        let month = index.rem_euclid(12) + 1;
        let season = SEASONAL_FACTOR[usize::try_from(month - 1).unwrap_or(0)];
        // Registered households grow by a tenth of a percent per month back from the end.
        let growth = 1.0 - offset as f64 * 0.001;
        let variation = 1.0 + ((district_id * 7 + month * 3) % 11 - 5) as f64 / 100.0;
        let households_work_provided = (baseline.households_work_provided as f64 * season * variation).round() as i64;
        let total_persondays = (baseline.persondays as f64 * season * variation).round() as i64;
        let avg_wage = round2(baseline.avg_wage + (year - 2020).max(0) as f64 * 6.0);
        records.push(MonthlyRecordUpsertType {
            district_id,
            year,
            month,
            households_registered: (baseline.households_registered as f64 * growth).round() as i64,
            households_work_provided,
            total_persondays,
            wages_paid: round2(total_persondays as f64 * avg_wage),
            women_participation_pct: round2((baseline.women_participation_pct + (month % 4) as f64 * 0.6 - 0.9).clamp(0.0, 100.0)),
            works_completed: (baseline.works_completed as f64 * season).round() as i64,
            works_ongoing: (baseline.works_ongoing as f64 * (2.0 - season) * 0.5 + baseline.works_ongoing as f64 * 0.5).round() as i64,
            avg_wage,
            source_date: source_date.clone(),
        });
    }
    records
}
