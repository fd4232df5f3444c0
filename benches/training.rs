use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use score_pipeline::training::{ModelCatalog, ModelSelector, Regressor};

/// Matrix with `n_features` columns followed by a target column
fn create_regression_matrix(n_rows: usize, n_features: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut m = Array2::zeros((n_rows, n_features + 1));

    for mut row in m.rows_mut() {
        let mut sum = 0.0;
        for j in 0..n_features {
            let v = rng.gen::<f64>() * 10.0;
            row[j] = v;
            sum += v * (j + 1) as f64;
        }
        row[n_features] = sum + rng.gen::<f64>();
    }
    m
}

fn bench_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [200, 800].iter() {
        let train = create_regression_matrix(*n_rows, 19, 1);
        let test = create_regression_matrix(*n_rows / 4, 19, 2);

        group.bench_with_input(
            BenchmarkId::new("evaluate_default", n_rows),
            &(train, test),
            |b, (train, test)| {
                b.iter(|| {
                    let mut catalog = ModelCatalog::default_catalog(42);
                    ModelSelector::default()
                        .evaluate_model(black_box(train), black_box(test), &mut catalog)
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

fn bench_models(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    let train = create_regression_matrix(800, 19, 3);
    let x = train.slice(ndarray::s![.., ..19]).to_owned();
    let y = train.column(19).to_owned();

    for entry in ModelCatalog::default_catalog(42).iter() {
        group.bench_with_input(BenchmarkId::from_parameter(&entry.name), &entry.model, |b, model| {
            b.iter(|| {
                let mut model = model.clone();
                model.fit(black_box(&x), black_box(&y)).unwrap();
                model
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_catalog, bench_models);
criterion_main!(benches);
