use async_trait::async_trait;
use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fake::faker::address::en::{CityName, StreetName};
use fake::faker::company::en::CompanyName;
use fake::Fake;
use firmy_core::{dedup, merge, Annotation, Candidate, CandidatePolicy, Record, SheetLayout, Spreadsheet};
use firmy_scrapers::{harvest, Collector, KeywordClassifier, SearchScope};
use rand::Rng;
use std::time::Duration;
use tokio::runtime::Runtime;

fn phone(rng: &mut impl Rng) -> String {
    let digits: u64 = rng.gen_range(500_000_000..800_000_000);
    let text = digits.to_string();
    // the same number shows up in several spellings
    match rng.gen_range(0..3) {
        0 => text,
        1 => format!("{} {} {}", &text[0..3], &text[3..6], &text[6..9]),
        _ => format!("+48 {}-{}-{}", &text[0..3], &text[3..6], &text[6..9]),
    }
}

fn generate_fake_records(count: usize) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    (0..count)
        .map(|_| Record {
            category: "hydraulik".to_string(),
            name: CompanyName().fake(),
            address: format!("{} {}", StreetName().fake::<String>(), CityName().fake::<String>()),
            phone: phone(&mut rng),
            website: rng.gen_bool(0.7).then(|| "https://firma.example".to_string()),
            matched_keyword_count: rng.gen_bool(0.5).then(|| rng.gen_range(0..20)),
            rejected: if rng.gen_bool(0.1) { Annotation::Yes } else { Annotation::Unset },
            first_seen: day,
            source: "benchmark".to_string(),
        })
        .collect()
}

struct FakeCollector(Vec<Candidate>);

#[async_trait]
impl Collector for FakeCollector {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn default_policy(&self) -> CandidatePolicy {
        CandidatePolicy::PhoneAndWebsite
    }

    async fn collect(&self, _scope: &SearchScope) -> Vec<Candidate> {
        self.0.clone()
    }
}

fn bench_merge_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("dedup", size), size, |b, &size| {
            let records = generate_fake_records(size);
            b.iter(|| black_box(dedup(records.clone())));
        });

        group.bench_with_input(BenchmarkId::new("merge", size), size, |b, &size| {
            let existing = generate_fake_records(size);
            let incoming = generate_fake_records(size);
            b.iter(|| black_box(merge(existing.clone(), incoming.clone()).added));
        });
    }

    group.finish();
}

fn bench_spreadsheet_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("spreadsheet");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("persist", size), size, |b, &size| {
            let records = generate_fake_records(size);
            b.iter(|| {
                let dir = tempfile::tempdir().unwrap();
                let spreadsheet = Spreadsheet::new(dir.path().join("firmy.xlsx"), SheetLayout::Single);
                black_box(spreadsheet.persist(records.clone()).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_harvest(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("harvest");
    group.sample_size(10);

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("filter_and_dedup", size), size, |b, &size| {
            let candidates: Vec<Candidate> = generate_fake_records(size)
                .into_iter()
                .map(|record| Candidate {
                    name: Some(record.name),
                    address: Some(record.address),
                    phone: Some(record.phone),
                    website: record.website,
                    ..Candidate::new("fake", record.category)
                })
                .collect();
            let collector = FakeCollector(candidates);
            let scope = SearchScope::Sweep {
                categories: vec!["hydraulik".to_string()],
                regions: vec!["mazowieckie".to_string()],
            };
            let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

            b.to_async(&rt).iter(|| async {
                black_box(
                    harvest(&collector, &scope, collector.default_policy(), None, day)
                        .await
                        .records
                        .len(),
                )
            });
        });
    }

    group.finish();
}

fn bench_keyword_scoring(c: &mut Criterion) {
    let classifier = KeywordClassifier::new(None, 2).unwrap();
    let paragraph = "Firma transportowa z własną flotą. Oferujemy transport krajowy, \
                     spedycja i logistyka, dojazd do klienta na terenie całego województwa. ";
    let html = format!(
        "<html><head><script>var x = 1;</script></head><body>{}</body></html>",
        paragraph.repeat(200)
    );

    c.bench_function("score_html", |b| {
        b.iter(|| black_box(classifier.score_html(&html)))
    });
}

criterion_group!(
    benches,
    bench_merge_operations,
    bench_spreadsheet_operations,
    bench_harvest,
    bench_keyword_scoring
);

criterion_main!(benches);
