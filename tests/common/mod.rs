//! Synthetic student-performance tables shared by the integration tests

#![allow(dead_code)]

use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const GENDERS: [&str; 2] = ["female", "male"];
pub const GROUPS: [&str; 5] = ["group A", "group B", "group C", "group D", "group E"];
pub const EDUCATION: [&str; 6] = [
    "associate's degree",
    "bachelor's degree",
    "high school",
    "master's degree",
    "some college",
    "some high school",
];
pub const LUNCH: [&str; 2] = ["free/reduced", "standard"];
pub const PREP: [&str; 2] = ["completed", "none"];

/// Number of one-hot columns the default schema produces
pub const N_CATEGORIES: usize = GENDERS.len() + GROUPS.len() + EDUCATION.len() + LUNCH.len() + PREP.len();

fn pick<'a>(rng: &mut ChaCha8Rng, row: usize, values: &[&'a str]) -> &'a str {
    // Leading rows cycle through every category so small tables see them all
    if row < values.len() {
        values[row]
    } else {
        values[rng.gen_range(0..values.len())]
    }
}

fn noise(rng: &mut ChaCha8Rng, scale: f64) -> f64 {
    (rng.gen::<f64>() + rng.gen::<f64>() + rng.gen::<f64>() - 1.5) * scale
}

/// `n` rows with the default schema. With `with_gaps`, a few feature cells are null.
pub fn student_table(n: usize, seed: u64, with_gaps: bool) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut gender = Vec::with_capacity(n);
    let mut group = Vec::with_capacity(n);
    let mut education = Vec::with_capacity(n);
    let mut lunch: Vec<Option<&str>> = Vec::with_capacity(n);
    let mut prep = Vec::with_capacity(n);
    let mut reading: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut writing: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut math = Vec::with_capacity(n);

    for i in 0..n {
        let g = pick(&mut rng, i, &GENDERS);
        let l = pick(&mut rng, i, &LUNCH);
        let p = pick(&mut rng, i, &PREP);
        let ability = 66.0 + noise(&mut rng, 30.0);

        let r = (ability + if g == "female" { 4.0 } else { -3.0 } + noise(&mut rng, 8.0)).clamp(0.0, 100.0);
        let w = (r + if p == "completed" { 5.0 } else { -2.0 } + noise(&mut rng, 8.0)).clamp(0.0, 100.0);
        let m = 0.6 * r + 0.35 * w + if l == "standard" { 8.0 } else { -2.0 } + if g == "male" { 6.0 } else { -2.0 }
            + noise(&mut rng, 6.0);

        gender.push(g);
        group.push(pick(&mut rng, i, &GROUPS));
        education.push(pick(&mut rng, i, &EDUCATION));
        lunch.push(if with_gaps && i % 131 == 130 { None } else { Some(l) });
        prep.push(p);
        reading.push(if with_gaps && i % 97 == 96 { None } else { Some(r.round()) });
        writing.push(Some(w.round()));
        math.push(m.round() as i64);
    }

    df! {
        "gender" => gender,
        "race/ethnicity" => group,
        "parental level of education" => education,
        "lunch" => lunch,
        "test preparation course" => prep,
        "reading score" => reading,
        "writing score" => writing,
        "math score" => math,
    }
    .unwrap()
}

/// Replace one cell of a string column
pub fn with_category(df: &DataFrame, column: &str, row: usize, value: &str) -> DataFrame {
    let values: Vec<Option<String>> = df
        .column(column)
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(i, v)| if i == row { Some(value.to_string()) } else { v.map(str::to_string) })
        .collect();
    let mut out = df.clone();
    out.replace(column, Series::new(column.into(), values)).unwrap();
    out
}

/// Names of the files directly inside `dir`
pub fn files_in(dir: &std::path::Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
