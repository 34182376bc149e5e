use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub avg: f64,
    pub median: f64,
    pub min: f64,
    pub p90: f64,
    pub max: f64,
    pub cnt: usize,
}

/// Summary of an already sorted sample list; `None` when it is empty.
pub fn summary_from_sorted(data: &[f64]) -> Option<Summary> {
    if data.is_empty() {
        return None;
    }

    let cnt = data.len();
    let sum: f64 = data.iter().sum();
    let pick = |q: f64| -> f64 {
        let idx = ((cnt - 1) as f64 * q) as usize;
        data[idx.min(cnt - 1)]
    };
    let median = match cnt % 2 {
        1 => data[cnt / 2],
        _ => (data[cnt / 2 - 1] + data[cnt / 2]) / 2.0,
    };

    Some(Summary {
        avg: sum / (cnt as f64),
        median,
        min: data[0],
        p90: pick(0.9),
        max: data[cnt - 1],
        cnt,
    })
}

pub fn summary_from_samples(samples: &[i64]) -> Option<Summary> {
    let mut data: Vec<f64> = samples.iter().map(|v| *v as f64).collect();
    data.sort_by(f64::total_cmp);
    summary_from_sorted(&data)
}
