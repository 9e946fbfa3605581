use criterion::{Criterion, criterion_group, criterion_main};
use projections::{StockFilter, StockView};
use store::Store;

/// Populate a store with `notes` committed inbound notes of 20 lines each,
/// spread over 4 warehouses, plus one outbound note per 10 inbound notes.
async fn populate_store(store: &Store, notes: i64) {
    let mut tx = store.begin().await.unwrap();
    for note_id in 1..=notes {
        let outbound = note_id % 10 == 0;
        let warehouse = if outbound { None } else { Some(note_id % 4 + 1) };
        sqlx::query("INSERT INTO note (id, warehouse_id, committed, updated_at) VALUES (?, ?, 1, 0)")
            .bind(note_id)
            .bind(warehouse)
            .execute(&mut *tx)
            .await
            .unwrap();

        for line in 0..20 {
            sqlx::query(
                "INSERT INTO book_transaction (note_id, isbn, warehouse_id, quantity, updated_at) \
                 VALUES (?, ?, ?, ?, 0)",
            )
            .bind(note_id)
            .bind(format!("978{line:010}"))
            .bind(note_id % 4 + 1)
            .bind(if outbound { 1 } else { 3 })
            .execute(&mut *tx)
            .await
            .unwrap();
        }
    }
    tx.commit().await.unwrap();
}

fn bench_full_stock(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(Store::in_memory()).unwrap();
    rt.block_on(populate_store(&store, 500));
    let view = StockView::new(store);

    c.bench_function("stock/full_10000_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.get_stock(&StockFilter::new()).await.unwrap();
            });
        });
    });
}

fn bench_single_warehouse(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(Store::in_memory()).unwrap();
    rt.block_on(populate_store(&store, 500));
    let view = StockView::new(store);
    let filter = StockFilter::for_warehouse(common::WarehouseId::new(2));

    c.bench_function("stock/single_warehouse", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.get_stock(&filter).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_full_stock, bench_single_warehouse);
criterion_main!(benches);
