use crate::day;
use firmy_core::{SheetLayout, Spreadsheet};
use firmy_scrapers::{
    harvest, Collector, CollectorSettings, Fetcher, PanoramaFirmCollector, PlacesCollector,
    SearchScope,
};
use mockito::{Matcher, Server};
use std::time::Duration;
use tempfile::tempdir;

fn settings() -> CollectorSettings {
    CollectorSettings {
        concurrency: 2,
        page_delay: Duration::ZERO,
        api_key: Some("test-key".to_string()),
    }
}

fn fetcher() -> Fetcher {
    Fetcher::new().unwrap().with_retry_delay(Duration::ZERO)
}

fn panorama_page(companies: &[(&str, &str, Option<&str>)]) -> String {
    let items: Vec<String> = companies
        .iter()
        .map(|(name, phone, website)| {
            let website = website
                .map(|w| format!(r#"<a class="icon-website" href="{}">www</a>"#, w))
                .unwrap_or_default();
            format!(
                r#"<li class="company-item">
                     <a class="company-name" href="/firma">{}</a>
                     <a class="icon-telephone" title="{}"></a>
                     {}
                     <div class="address">Rynek 1, Radom w odległości: 2 km</div>
                   </li>"#,
                name, phone, website
            )
        })
        .collect();

    format!(
        r#"<html><body>
             <h1 class="font-size-base font-weight-normal text-color-inherit">{} firm</h1>
             <ul>{}</ul>
           </body></html>"#,
        companies.len(),
        items.join("\n")
    )
}

#[tokio::test]
async fn test_directory_sweep_into_spreadsheet_twice() {
    let mut server = Server::new_async().await;
    let page = panorama_page(&[
        ("Aqua-Serwis", "48 123 456 789", Some("https://aqua.pl")),
        ("Aqua-Serwis Oddział", "48123456789", Some("https://aqua2.pl")),
        ("Bez Strony", "600 100 200", None),
        ("Hydro-Max", "600 300 400", Some("https://hydro.pl")),
    ]);
    let _listing = server
        .mock("GET", "/hydraulik/mazowieckie")
        .with_status(200)
        .with_body(page)
        .create_async()
        .await;

    let collector = PanoramaFirmCollector::new(fetcher(), &settings()).with_base_url(server.url());
    let scope = SearchScope::Sweep {
        categories: vec!["hydraulik".to_string()],
        regions: vec!["mazowieckie".to_string()],
    };

    let dir = tempdir().unwrap();
    let spreadsheet = Spreadsheet::new(dir.path().join("firmy.xlsx"), SheetLayout::Single);

    let first = harvest(&collector, &scope, collector.default_policy(), None, day(1)).await;
    assert_eq!(first.found, 3);
    assert_eq!(first.records.len(), 2);
    let outcome = spreadsheet.persist(first.records).unwrap();
    assert_eq!(outcome.added, 2);

    let second = harvest(&collector, &scope, collector.default_policy(), None, day(2)).await;
    let outcome = spreadsheet.persist(second.records).unwrap();
    assert_eq!(outcome.added, 0);

    let stored = spreadsheet.load().unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|r| r.address == "Rynek 1, Radom"));
    assert!(stored.iter().all(|r| r.first_seen == day(1)));
}

#[tokio::test]
async fn test_places_search_into_spreadsheet() {
    let mut server = Server::new_async().await;
    let _geocode = server
        .mock("GET", Matcher::Regex(r"^/maps/api/geocode/json".to_string()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"OK","results":[{"geometry":{"location":{"lat":51.4,"lng":21.15}}}]}"#)
        .create_async()
        .await;
    let _search = server
        .mock("POST", "/v1/places:searchText")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"places":[
                {"displayName":{"text":"Elektro-Pol"},"formattedAddress":"ul. Słowackiego 4, Radom",
                 "internationalPhoneNumber":"+48 48 360 00 00","websiteUri":"https://elektropol.pl"},
                {"displayName":{"text":"Bez Strony"},"internationalPhoneNumber":"+48 600 000 000"},
                {"displayName":{"text":"Bez Telefonu"},"websiteUri":"https://brak.pl"}
            ]}"#,
        )
        .create_async()
        .await;

    let collector = PlacesCollector::new(fetcher(), "test-key".to_string(), &settings())
        .with_base_urls(server.url(), server.url());
    let scope = SearchScope::Area {
        place: "Radom".to_string(),
        radius_m: 10_000,
        categories: vec!["elektryk".to_string()],
    };

    let result = harvest(&collector, &scope, collector.default_policy(), None, day(5)).await;
    assert_eq!(result.found, 1);

    let dir = tempdir().unwrap();
    let spreadsheet = Spreadsheet::new(dir.path().join("firmy.xlsx"), SheetLayout::Single);
    spreadsheet.persist(result.records).unwrap();

    let stored = spreadsheet.load().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Elektro-Pol");
    assert_eq!(stored[0].category, "elektryk");
    assert_eq!(stored[0].website.as_deref(), Some("https://elektropol.pl"));
}

#[tokio::test]
async fn test_unreachable_directory_adds_nothing() {
    let mut server = Server::new_async().await;
    let _down = server
        .mock("GET", Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let collector = PanoramaFirmCollector::new(fetcher(), &settings()).with_base_url(server.url());
    let scope = SearchScope::Sweep {
        categories: vec!["hydraulik".to_string(), "elektryk".to_string()],
        regions: vec!["mazowieckie".to_string()],
    };

    let result = harvest(&collector, &scope, collector.default_policy(), None, day(1)).await;
    assert_eq!(result.found, 0);
    assert!(result.records.is_empty());

    let dir = tempdir().unwrap();
    let spreadsheet = Spreadsheet::new(dir.path().join("firmy.xlsx"), SheetLayout::Single);
    let outcome = spreadsheet.persist(result.records).unwrap();
    assert_eq!(outcome.added, 0);
    assert!(spreadsheet.path().exists());
}
