pub mod common;

use common::{csv_file, reman_csv, stored_product, InMemoryProductStore, RemanRow};
use parts_import::{
    config::ImportConfig,
    job::{ImportJob, ImportStatus},
    product::{
        dedup::{DuplicatePolicy, DuplicateReport},
        reman::DEFAULT_CATEGORY,
    },
    BatchError,
};

fn job_for(content: &str) -> Result<(tempfile::NamedTempFile, ImportJob), BatchError> {
    let file = csv_file(content);
    let job = ImportJob::new(ImportConfig::new(file.path()))?;
    Ok((file, job))
}

#[test]
fn should_build_composite_fields() -> Result<(), BatchError> {
    let (_file, job) = job_for(&reman_csv(&[
        RemanRow::new("TX-100", "6.0L Injector").priced("$1,800.00", "$1,350.50")
    ]))?;
    let store = InMemoryProductStore::new();

    let summary = job.run_reman(&store, &mut DuplicatePolicy::Skip)?;

    assert_eq!(summary.status, ImportStatus::Completed);
    assert_eq!(summary.imported, 1);

    let product = store.get("TX-100").unwrap();
    assert_eq!(product.name, "6.0L Injector");
    assert_eq!(product.category.as_deref(), Some("Injectors"));
    assert_eq!(product.application.as_deref(), Some("Ford 6.0L (2003-2007)"));
    assert_eq!(product.years.as_deref(), Some("2003-2007"));
    assert_eq!(product.oe_number.as_deref(), Some("OEM-TX-100"));
    assert_eq!(
        product.comments.as_deref(),
        Some("OEM: OEM-TX-100 | Part#: PN-1")
    );
    assert_eq!(
        product.description.as_deref(),
        Some(
            "Manufacturer: Navistar | Condition: Reman | Remanufactured In-House | Core Exchange: $250.00"
        )
    );
    assert_eq!(product.weight, Some(4.5));
    assert_eq!(product.unit_price, Some(180_000));
    assert_eq!(product.unit_cost, Some(135_050));
    assert_eq!(summary.stats.total, 1);
    Ok(())
}

#[test]
fn should_fall_back_to_vendor_cost_and_default_category() -> Result<(), BatchError> {
    let content = reman_csv(&[RemanRow::new("TX-1", "Injector").priced("$100.00", "")])
        .replace(",Injectors,", ",,");
    let (_file, job) = job_for(&content)?;
    let store = InMemoryProductStore::new();

    job.run_reman(&store, &mut DuplicatePolicy::Skip)?;

    let product = store.get("TX-1").unwrap();
    assert_eq!(product.category.as_deref(), Some(DEFAULT_CATEGORY));
    assert_eq!(product.unit_cost, Some(70_000));
    Ok(())
}

#[test]
fn skip_policy_inserts_only_new_skus() -> Result<(), BatchError> {
    let store = InMemoryProductStore::with_products(vec![stored_product("TX-1", "Stored injector")]);
    let (_file, job) = job_for(&reman_csv(&[
        RemanRow::new("TX-1", "Injector A"),
        RemanRow::new("TX-2", "Injector B"),
        RemanRow::new("TX-3", "Injector C"),
    ]))?;

    let summary = job.run_reman(&store, &mut DuplicatePolicy::Skip)?;

    assert_eq!(summary.status, ImportStatus::Completed);
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.existing, 1);
    assert_eq!(store.committed_chunks(), vec![2]);
    assert_eq!(store.len(), 3);
    assert_eq!(store.get("TX-1").unwrap().name, "Stored injector");
    Ok(())
}

#[test]
fn abort_policy_writes_nothing() -> Result<(), BatchError> {
    let store = InMemoryProductStore::with_products(vec![stored_product("TX-1", "Stored injector")]);
    let (_file, job) = job_for(&reman_csv(&[
        RemanRow::new("TX-1", "Injector A"),
        RemanRow::new("TX-2", "Injector B"),
    ]))?;

    let summary = job.run_reman(&store, &mut DuplicatePolicy::Abort)?;

    assert_eq!(summary.status, ImportStatus::Cancelled);
    assert!(summary.is_success());
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.existing, 1);
    assert_eq!(store.write_calls(), 0);
    assert_eq!(store.len(), 1);
    Ok(())
}

#[test]
fn overwrite_policy_updates_existing_rows_in_place() -> Result<(), BatchError> {
    let stored = stored_product("TX-1", "Stored injector");
    let stored_id = stored.id.clone();
    let store = InMemoryProductStore::with_products(vec![stored]);
    let (_file, job) = job_for(&reman_csv(&[
        RemanRow::new("TX-1", "Injector A").priced("$2,000.00", "$1,000.00"),
        RemanRow::new("TX-2", "Injector B"),
    ]))?;

    let summary = job.run_reman(&store, &mut DuplicatePolicy::Overwrite)?;

    assert_eq!(summary.imported, 2);
    assert_eq!(store.committed_chunks(), vec![2]);

    let product = store.get("TX-1").unwrap();
    assert_eq!(product.id, stored_id);
    assert_eq!(product.stock_quantity, 7);
    assert_eq!(product.name, "Injector A");
    assert_eq!(product.unit_price, Some(200_000));
    assert_eq!(product.unit_cost, Some(100_000));
    assert_eq!(product.application.as_deref(), Some("Ford 6.0L (2003-2007)"));
    Ok(())
}

#[test]
fn resolver_sees_the_existing_skus() -> Result<(), BatchError> {
    let store = InMemoryProductStore::with_products(vec![
        stored_product("TX-1", "A"),
        stored_product("TX-3", "C"),
    ]);
    let (_file, job) = job_for(&reman_csv(&[
        RemanRow::new("TX-1", "Injector A"),
        RemanRow::new("TX-2", "Injector B"),
        RemanRow::new("TX-3", "Injector C"),
    ]))?;

    let mut seen = Vec::new();
    let mut resolver = |report: &DuplicateReport<'_>| -> Result<DuplicatePolicy, BatchError> {
        seen = report.existing_skus().map(str::to_string).collect();
        assert_eq!(report.new_count, 1);
        Ok(DuplicatePolicy::Skip)
    };

    let summary = job.run_reman(&store, &mut resolver)?;

    assert_eq!(seen, vec!["TX-1".to_string(), "TX-3".to_string()]);
    assert_eq!(summary.imported, 1);
    Ok(())
}

#[test]
fn resolver_is_not_consulted_without_existing_skus() -> Result<(), BatchError> {
    let store = InMemoryProductStore::new();
    let (_file, job) = job_for(&reman_csv(&[RemanRow::new("TX-1", "Injector A")]))?;

    let mut resolver = |_: &DuplicateReport<'_>| -> Result<DuplicatePolicy, BatchError> {
        panic!("no existing SKUs, nothing to resolve")
    };

    let summary = job.run_reman(&store, &mut resolver)?;

    assert_eq!(summary.imported, 1);
    assert_eq!(store.lookups(), 1);
    Ok(())
}

#[test]
fn repeated_skus_keep_their_first_occurrence() -> Result<(), BatchError> {
    let store = InMemoryProductStore::new();
    let (_file, job) = job_for(&reman_csv(&[
        RemanRow::new("TX-1", "First"),
        RemanRow::new("TX-2", "Other"),
        RemanRow::new("TX-1", "Second"),
    ]))?;

    let summary = job.run_reman(&store, &mut DuplicatePolicy::Skip)?;

    assert_eq!(summary.imported, 2);
    assert_eq!(summary.repeated, 1);
    assert_eq!(store.get("TX-1").unwrap().name, "First");
    Ok(())
}

#[test]
fn stored_sku_repeated_in_the_file_is_reported_and_not_loaded() -> Result<(), BatchError> {
    let store = InMemoryProductStore::with_products(vec![stored_product("TX-1", "Stored injector")]);
    let (_file, job) = job_for(&reman_csv(&[
        RemanRow::new("TX-1", "Injector A"),
        RemanRow::new("TX-1", "Injector A again"),
        RemanRow::new("TX-2", "Injector B"),
    ]))?;

    let mut seen = Vec::new();
    let mut resolver = |report: &DuplicateReport<'_>| -> Result<DuplicatePolicy, BatchError> {
        seen = report.existing_skus().map(str::to_string).collect();
        assert_eq!(report.new_count, 1);
        assert_eq!(report.repeated_count, 1);
        Ok(DuplicatePolicy::Skip)
    };

    let summary = job.run_reman(&store, &mut resolver)?;

    assert_eq!(seen, vec!["TX-1".to_string()]);
    assert_eq!(summary.status, ImportStatus::Completed);
    assert_eq!(summary.existing, 1);
    assert_eq!(summary.repeated, 1);
    assert_eq!(summary.imported, 1);
    assert_eq!(store.committed_chunks(), vec![1]);
    assert_eq!(store.get("TX-1").unwrap().name, "Stored injector");
    assert_eq!(store.skus(), vec!["TX-1".to_string(), "TX-2".to_string()]);
    Ok(())
}

#[test]
fn short_and_keyless_rows_are_skipped() -> Result<(), BatchError> {
    let mut content = reman_csv(&[RemanRow::new("TX-1", "Injector A")]);
    let keyless = reman_csv(&[RemanRow::new("", "No SKU")]);
    content.push_str("99,TX-9,Too short,PN\n\n");
    content.push_str(keyless.lines().nth(2).unwrap());
    content.push('\n');
    let (_file, job) = job_for(&content)?;
    let store = InMemoryProductStore::new();

    let summary = job.run_reman(&store, &mut DuplicatePolicy::Skip)?;

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(store.skus(), vec!["TX-1".to_string()]);
    Ok(())
}

#[test]
fn missing_sku_column_is_a_configuration_error() -> Result<(), BatchError> {
    let (_file, job) = job_for("exported 2024-01-05\nID,NAME,PRICE\n1,Injector,$10.00\n")?;
    let store = InMemoryProductStore::new();

    let result = job.run_reman(&store, &mut DuplicatePolicy::Skip);

    assert!(matches!(result, Err(BatchError::Configuration(msg)) if msg.contains("SKU")));
    assert_eq!(store.lookups(), 0);
    Ok(())
}

#[test]
fn failed_load_leaves_the_store_untouched() -> Result<(), BatchError> {
    let store = InMemoryProductStore::failing_on_write(1);
    let (_file, job) = job_for(&reman_csv(&[
        RemanRow::new("TX-1", "Injector A"),
        RemanRow::new("TX-2", "Injector B"),
    ]))?;

    let summary = job.run_reman(&store, &mut DuplicatePolicy::Skip)?;

    assert!(matches!(summary.status, ImportStatus::WriteFailed(_)));
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.stats.total, 0);
    assert_eq!(store.len(), 0);
    Ok(())
}

#[test]
fn export_without_products_loads_nothing() -> Result<(), BatchError> {
    let (_file, job) = job_for(&reman_csv(&[]))?;
    let store = InMemoryProductStore::new();

    let summary = job.run_reman(&store, &mut DuplicatePolicy::Abort)?;

    assert_eq!(summary.status, ImportStatus::Completed);
    assert_eq!(summary.imported, 0);
    assert_eq!(store.lookups(), 0);
    assert_eq!(store.write_calls(), 0);
    Ok(())
}
