//! Paged search behaviour: fetch counts, laziness, cursors and page failures

mod common;

use common::{
    client_over, create_test_product, numbered_product, save_products, settings, CountingBackend,
    Product,
};
use redisearch_client::metrics::DECODE_FAILURES_TOTAL;
use redisearch_client::{
    ClientError, Document, IndexBackend, PageFailureAction, PagedResults, SearchClient,
    SearchContext,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn client_with(backend: &Arc<CountingBackend>, count: usize) -> SearchClient<Product> {
    let shared: Arc<dyn IndexBackend> = backend.clone();
    let client =
        SearchClient::with_json_codec(shared, Product::descriptor("paging"), settings()).unwrap();
    save_products(&client, count);
    client
}

fn client_side() -> SearchContext {
    SearchContext::new().client_side_paging(true).page_size(1000)
}

fn drain(context: &SearchContext, client: &SearchClient<Product>) -> Vec<Result<String, ClientError>> {
    client
        .search(context)
        .unwrap()
        .result_stream(false)
        .map(|item| item.map(|r| r.key().to_string()))
        .collect()
}

#[test]
fn test_client_side_fetch_count() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2500);

    let stream = client.search(&client_side()).unwrap().result_stream(false);
    assert_eq!(stream.total_results(), 2500);

    let mut yielded = 0;
    let mut stream = stream;
    for item in stream.by_ref() {
        item.unwrap().result().unwrap().unwrap();
        yielded += 1;
    }
    assert_eq!(yielded, 2500);
    assert_eq!(stream.pages_fetched(), 3);
    assert_eq!(backend.searches(), 3);
}

#[test]
fn test_exact_multiple_of_page_size() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2000);

    let keys = drain(&client_side(), &client);
    assert_eq!(keys.len(), 2000);
    // The last full page reaches the reported total, so no trailing empty fetch
    assert_eq!(backend.searches(), 2);
}

#[test]
fn test_pages_are_fetched_lazily() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2500);

    let mut stream = client.search(&client_side()).unwrap().result_stream(false);
    assert_eq!(backend.searches(), 1);

    for _ in 0..1000 {
        stream.next().unwrap().unwrap();
    }
    assert_eq!(backend.searches(), 1);

    stream.next().unwrap().unwrap();
    assert_eq!(backend.searches(), 2);
}

#[test]
fn test_limit_bounds_client_side_stream() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2500);

    let context = client_side().offset(100).limit(1500);
    let keys: Vec<String> = drain(&context, &client)
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(keys.len(), 1500);
    assert_eq!(keys.first().map(String::as_str), Some("00100"));
    assert_eq!(keys.last().map(String::as_str), Some("01599"));
    assert_eq!(backend.searches(), 2);
}

#[test]
fn test_empty_result_fetches_once() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 10);

    let context = client_side().with_filter("color", "green");
    let paged = client.search(&context).unwrap();
    assert_eq!(paged.total_results(), 0);
    assert_eq!(paged.result_stream(false).count(), 0);
    assert_eq!(backend.searches(), 1);
}

#[test]
fn test_cursor_stream_reads_until_exhausted() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2500);

    let paged = client.search(&SearchContext::new().page_size(1000)).unwrap();
    assert!(paged.is_cursor());
    assert_eq!(paged.total_results(), 2500);

    let count = paged.result_stream(false).map(|item| item.unwrap()).count();
    assert_eq!(count, 2500);
    assert_eq!(backend.cursor_queries(), 1);
    assert_eq!(backend.cursor_reads(), 2);
    assert_eq!(backend.searches(), 0);
    assert_eq!(backend.inner.open_cursors(), 0);
}

#[test]
fn test_empty_cursor_batch_ends_stream() {
    let backend = CountingBackend::with_sticky_cursor();
    let client = client_with(&backend, 2500);

    let count = client
        .search(&SearchContext::new().page_size(1000))
        .unwrap()
        .result_stream(false)
        .map(|item| item.unwrap())
        .count();
    assert_eq!(count, 2500);
    // Two real reads, then one empty batch, then nothing more
    assert_eq!(backend.cursor_reads(), 3);
    assert_eq!(backend.cursor_closes(), 1);
}

#[test]
fn test_cursor_falls_back_to_client_side() {
    let backend = CountingBackend::without_cursors();
    let client = client_with(&backend, 1500);

    let paged = client.search(&SearchContext::new().page_size(1000)).unwrap();
    assert!(!paged.is_cursor());
    assert_eq!(paged.result_stream(false).count(), 1500);
    assert_eq!(backend.cursor_queries(), 0);
    assert_eq!(backend.searches(), 2);
}

#[test]
fn test_page_failure_without_handler_ends_stream() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2500);
    backend.fail_search(2);

    let items = drain(&client_side(), &client);
    assert_eq!(items.len(), 1001);
    assert!(items[..1000].iter().all(Result::is_ok));
    assert!(matches!(items[1000], Err(ClientError::Backend(_))));
    assert_eq!(backend.searches(), 2);
}

#[test]
fn test_page_failure_continue_skips_page() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2500);
    backend.fail_search(2);

    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    let context = client_side().on_page_failure(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        PageFailureAction::Continue
    });

    let keys: Vec<String> = drain(&context, &client)
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(keys.len(), 1500);
    assert_eq!(keys[1000], "02000");
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(backend.searches(), 3);
}

#[test]
fn test_page_failure_halt_ends_quietly() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2500);
    backend.fail_search(2);

    let context = client_side().on_page_failure(|_| PageFailureAction::Halt);
    let items = drain(&context, &client);
    assert_eq!(items.len(), 1000);
    assert!(items.iter().all(Result::is_ok));
    assert_eq!(backend.searches(), 2);
}

#[test]
fn test_cursor_failure_closes_cursor() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2500);
    backend.fail_cursor_read(1);

    let items = drain(&SearchContext::new().page_size(1000), &client);
    assert_eq!(items.len(), 1001);
    assert!(items[1000].is_err());
    assert_eq!(backend.cursor_reads(), 1);
    assert_eq!(backend.cursor_closes(), 1);
    assert_eq!(backend.inner.open_cursors(), 0);
}

#[test]
fn test_dropping_stream_closes_cursor() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 2500);

    let mut stream = client
        .search(&SearchContext::new().page_size(1000))
        .unwrap()
        .result_stream(false);
    for _ in 0..5 {
        stream.next().unwrap().unwrap();
    }
    assert_eq!(backend.inner.open_cursors(), 1);

    drop(stream);
    assert_eq!(backend.inner.open_cursors(), 0);
    assert_eq!(backend.cursor_closes(), 1);
}

#[test]
fn test_parallel_stream_matches_sequential() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 1200);

    let collect = |parallel: bool| -> Vec<Product> {
        client
            .search(&SearchContext::new().with_filter("color", "red").page_size(250))
            .unwrap()
            .result_stream(parallel)
            .map(|item| item.unwrap().result().unwrap().unwrap())
            .collect()
    };

    let sequential = collect(false);
    let parallel = collect(true);
    assert_eq!(sequential.len(), 600);
    assert_eq!(sequential, parallel);
}

#[test]
fn test_keys_only_stream_fetches_on_demand() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 3);

    let mut stream = client
        .search(&SearchContext::new().keys_only())
        .unwrap()
        .result_stream(false);

    let first = stream.next().unwrap().unwrap();
    assert_eq!(first.key(), "00000");
    assert_eq!(first.result().unwrap(), Some(numbered_product(0)));

    // Deleted after the search ran
    client.delete("00001").unwrap();
    let second = stream.next().unwrap().unwrap();
    assert_eq!(second.key(), "00001");
    assert!(second.result().unwrap().is_none());
}

#[test]
fn test_stream_item_decode_failure_is_isolated() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 0);
    client.save(&create_test_product("a", "Anvil", "red")).unwrap();
    let corrupt = Document::new(client.document_key("b"))
        .with_field("color", "red")
        .with_payload(vec![0x1f, 0x8b, 0x00]);
    backend.write_document(client.index_name(), &corrupt).unwrap();
    client.save(&create_test_product("c", "Clamp", "red")).unwrap();

    let results: Vec<_> = client
        .find_all(None)
        .unwrap()
        .result_stream(true)
        .map(|item| {
            let item = item.unwrap();
            (item.key().to_string(), item.result())
        })
        .collect();

    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_ok());
    assert!(matches!(results[1].1, Err(ClientError::Decode { ref key, .. }) if key.ends_with("b")));
    assert!(results[2].1.is_ok());
}

/// Client over its own index holding one good and one corrupt document
fn client_with_corrupt_document(
    backend: &Arc<CountingBackend>,
    index: &str,
) -> SearchClient<Product> {
    let client = client_over(backend.clone(), index);
    client.save(&create_test_product("a", "Anvil", "red")).unwrap();
    let corrupt = Document::new(client.document_key("b"))
        .with_field("color", "red")
        .with_payload(vec![0x1f, 0x8b, 0x00]);
    backend.write_document(client.index_name(), &corrupt).unwrap();
    client
}

fn decode_failures_counted(index: &str) -> f64 {
    DECODE_FAILURES_TOTAL.with_label_values(&[index]).get()
}

/// Resolve every item of a stream and return how many failed to decode
fn resolve_all(paged: PagedResults<Product>, parallel: bool) -> usize {
    paged
        .result_stream(parallel)
        .map(|item| item.unwrap().result())
        .filter(|result| matches!(result, Err(ClientError::Decode { .. })))
        .count()
}

#[test]
fn test_decode_failure_counted_once_per_item() {
    for (index, parallel) in [("decode_count_seq", false), ("decode_count_par", true)] {
        let backend = CountingBackend::new();
        let client = client_with_corrupt_document(&backend, index);

        let before = decode_failures_counted(index);
        let failed = resolve_all(client.find_all(None).unwrap(), parallel);
        assert_eq!(failed, 1);
        assert_eq!(
            decode_failures_counted(index) - before,
            1.0,
            "parallel = {}",
            parallel
        );
    }
}

#[test]
fn test_keys_only_decode_failure_is_counted() {
    for (index, parallel) in [("decode_fetch_seq", false), ("decode_fetch_par", true)] {
        let backend = CountingBackend::new();
        let client = client_with_corrupt_document(&backend, index);

        let before = decode_failures_counted(index);
        let paged = client.search(&SearchContext::new().keys_only()).unwrap();
        assert_eq!(resolve_all(paged, parallel), 1);
        assert_eq!(
            decode_failures_counted(index) - before,
            1.0,
            "parallel = {}",
            parallel
        );
    }
}

#[test]
fn test_find_counts_each_decode_failure_once() {
    let backend = CountingBackend::new();
    let client = client_with_corrupt_document(&backend, "decode_count_find");

    let before = decode_failures_counted("decode_count_find");
    let found = client.find(&SearchContext::new()).unwrap();
    assert_eq!(found.decode_failures, vec!["b".to_string()]);
    assert_eq!(decode_failures_counted("decode_count_find") - before, 1.0);
}

#[test]
fn test_keys_only_find_propagates_read_errors() {
    let backend = CountingBackend::new();
    let client = client_over(backend.clone(), "keys_only_reads");
    client.save(&create_test_product("a", "Anvil", "red")).unwrap();
    backend.fail_reads();

    let result = client.find(&SearchContext::new().keys_only());
    assert!(matches!(result, Err(ClientError::Backend(ref m)) if m.contains("connection reset")));

    // Payload-carrying searches never read documents back
    let found = client.find(&SearchContext::new()).unwrap();
    assert_eq!(found.keys(), vec!["a"]);
}

#[test]
fn test_keys_only_find_skips_vanished_documents() {
    let backend = CountingBackend::new();
    let client = client_over(backend.clone(), "keys_only_vanished");
    client.save(&create_test_product("a", "Anvil", "red")).unwrap();
    backend.vanish_reads();

    let found = client.find(&SearchContext::new().keys_only()).unwrap();
    assert_eq!(found.total, 1);
    assert!(found.results.is_empty());
    assert_eq!(found.decode_failures, vec!["a".to_string()]);
}

#[test]
fn test_total_fixed_when_stream_opens() {
    let backend = CountingBackend::new();
    let client = client_with(&backend, 5);

    let paged = client.search(&client_side()).unwrap();
    client.save(&numbered_product(99)).unwrap();
    assert_eq!(paged.total_results(), 5);
    assert_eq!(paged.keys().count(), 5);
    assert_eq!(client.key_count().unwrap(), 6);
}
