use aviwx::{
    group, parse_record, BoundingBox, Coordinate, Metar, Observation, ObservationKind, Station,
    WeatherStore,
};
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

fn bench_projection(c: &mut Criterion) {
    let helsinki = Coordinate::from_degrees(24.94, 60.17);
    let finland = BoundingBox::new(
        Coordinate::from_degrees(20.0, 59.0),
        Coordinate::from_degrees(31.0, 70.0),
    );
    c.bench_function("coordinate_to_tile", |b| {
        b.iter(|| black_box(helsinki).tile(black_box(12), 0, 0))
    });
    c.bench_function("destination", |b| {
        b.iter(|| black_box(helsinki).destination(black_box(100.0), black_box(45.0)))
    });
    c.bench_function("tile_range_z10", |b| {
        b.iter(|| black_box(&finland).tiles(10).iter().count())
    });
}

fn bench_observations(c: &mut Criterion) {
    let reference = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
    c.bench_function("parse_metar", |b| {
        b.iter(|| {
            parse_record(
                ObservationKind::Metar,
                black_box("METAR EFHK 151150Z 24010KT 4000 -SHRA FEW008 BKN012 OVC030 05/03 Q1012"),
                reference,
            )
        })
    });

    let observations: Vec<Observation> = (0..2_000)
        .map(|i| {
            Observation::Metar(Metar {
                identifier: format!("S{:03}", i % 200),
                datetime: reference - Duration::minutes(i),
                raw: String::new(),
                cloud_height: Some(12),
                visibility: Some(9999),
                temperature: Some(5),
                dew_point: Some(3),
            })
        })
        .collect();
    c.bench_function("group_2000", |b| {
        b.iter(|| group(black_box(observations.clone()), 30, reference))
    });

    let runtime = Runtime::new().unwrap();
    let store = WeatherStore::in_memory();
    let stations: Vec<Station> = (0..200)
        .map(|i| Station {
            identifier: format!("S{:03}", i),
            name: None,
            latitude: 60.0,
            longitude: 25.0,
            has_metar: true,
            has_taf: false,
        })
        .collect();
    runtime.block_on(store.replace_stations(stations)).unwrap();
    let metars: Vec<Metar> = observations
        .iter()
        .filter_map(|o| o.as_metar().cloned())
        .collect();
    c.bench_function("store_replace_observations", |b| {
        b.to_async(&runtime)
            .iter(|| store.replace_observations(metars.clone(), Vec::new()))
    });
}

criterion_group!(benches, bench_projection, bench_observations);
criterion_main!(benches);
