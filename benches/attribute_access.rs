use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use eavkit::{
    Eav, EavConfig, HasEntityAttributes, Record, RecordDefinition, SchemaIntrospector,
    SqliteBackend,
};
use std::sync::Arc;
use std::time::Duration;

fn setup(columns: usize) -> (Eav, Arc<SqliteBackend>, Arc<RecordDefinition>) {
    let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
    let extra: String = (0..columns).map(|i| format!(", c{} TEXT", i)).collect();
    backend
        .with_conn("bench.setup", |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT{});
                 INSERT INTO products (id, name) VALUES (1, 'Lamp');",
                extra
            ))?;
            Ok(())
        })
        .unwrap();
    let eav = Eav::new(backend.clone(), &EavConfig::default());
    (eav, backend, Arc::new(RecordDefinition::new("products")))
}

/// Cached column lookup vs. introspecting the table every time
fn bench_column_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("column_lookup");
    group.measurement_time(Duration::from_secs(5));

    for columns in [4usize, 32, 128] {
        let (eav, backend, _) = setup(columns);
        eav.schema().columns_of("products").unwrap();

        group.bench_with_input(BenchmarkId::new("cached", columns), &columns, |b, _| {
            b.iter(|| black_box(eav.schema().has_column("products", "name").unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("introspect", columns), &columns, |b, _| {
            b.iter(|| black_box(backend.list_columns("products").unwrap().len()));
        });
    }

    group.finish();
}

fn bench_dynamic_attributes(c: &mut Criterion) {
    let mut group = c.benchmark_group("dynamic_attributes");
    let (eav, _, products) = setup(4);
    let mut product = Record::find(&eav, products.clone(), "1").unwrap().unwrap();
    product.set_attribute(&eav, "color", "red").unwrap();

    group.bench_function("get_dynamic", |b| {
        b.iter(|| black_box(product.get_attribute(&eav, "color").unwrap()));
    });
    group.bench_function("get_fixed", |b| {
        b.iter(|| black_box(product.get_attribute(&eav, "name").unwrap()));
    });
    group.bench_function("set_dynamic", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            product.set_attribute(&eav, "counter", n).unwrap();
        });
    });
    group.bench_function("save_with_store", |b| {
        b.iter(|| {
            product.set_attribute(&eav, "color", "blue").unwrap();
            product.save(&eav).unwrap();
        });
    });
    group.bench_function("load_with_store", |b| {
        b.iter(|| black_box(Record::find(&eav, products.clone(), "1").unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_column_lookup, bench_dynamic_attributes);
criterion_main!(benches);
