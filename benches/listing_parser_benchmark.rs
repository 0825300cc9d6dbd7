//! Listing extraction throughput on a synthetic 40-listing results page

use classifieds_crawler_lib::infrastructure::parsing::{ContextualParser, ListingParser, ParseContext};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use scraper::Html;

fn results_page(listings: usize) -> String {
    let items: String = (0..listings)
        .map(|i| {
            format!(
                r#"<li><div data-aut-id="itemBox"><a href="/item/cover-iid-{i}">
                     <img src="https://img.example/{i}.jpg">
                     <span data-aut-id="itemPrice">₹ {i},000</span>
                     <span data-aut-id="itemTitle">Car cover {i}</span>
                     <span data-aut-id="item-location">Mumbai</span>
                     <span data-aut-id="item-date">Today</span>
                   </a></div></li>"#
            )
        })
        .collect();
    format!("<html><head><title>Car cover | OLX</title></head><body><ul>{items}</ul></body></html>")
}

fn link_fallback_page(listings: usize) -> String {
    let items: String = (0..listings)
        .map(|i| format!(r#"<p><a href="/item/x-iid-{i}"><span data-aut-id="itemTitle">Cover {i}</span></a></p>"#))
        .collect();
    format!("<html><body><section>{items}</section></body></html>")
}

fn benchmark_listing_parser(c: &mut Criterion) {
    let parser = ListingParser::new().unwrap();
    let context = ParseContext::new(1, "https://www.olx.in");

    let item_box = results_page(40);
    c.bench_function("parse_item_box_page", |b| {
        b.iter(|| {
            let html = Html::parse_document(black_box(&item_box));
            parser.parse_with_context(&html, &context).unwrap()
        });
    });

    let fallback = link_fallback_page(40);
    c.bench_function("parse_link_fallback_page", |b| {
        b.iter(|| {
            let html = Html::parse_document(black_box(&fallback));
            parser.parse_with_context(&html, &context).unwrap()
        });
    });
}

criterion_group!(benches, benchmark_listing_parser);
criterion_main!(benches);
