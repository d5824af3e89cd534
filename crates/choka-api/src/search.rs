use axum::{Json, extract::State};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Datelike, FixedOffset, Utc};
use tracing::debug;

use choka_db::{Database, SearchRow};
use choka_types::Prefecture;
use choka_types::api::{ChartImage, SearchForm, SearchHit, SearchRequest, SearchResponse};

use crate::auth::AppState;
use crate::chart::{ChartRenderer, months};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::run_blocking;
use crate::validation::FieldErrors;

pub const MEDIA_PREFIX: &str = "/media/";

/// Catch results with this exact fish name, newest first. An empty
/// `prefecture` searches everywhere. A name longer than any stored one is
/// still a valid query; it simply finds nothing.
pub fn search(db: &Database, fish_name: &str, prefecture: &str) -> ApiResult<Vec<SearchHit>> {
    let mut errors = FieldErrors::new();
    errors.fish_name_pattern("fish_name", fish_name);
    let prefecture = if prefecture.is_empty() {
        None
    } else {
        match prefecture.parse::<Prefecture>() {
            Ok(p) => Some(p),
            Err(e) => {
                errors.add("prefecture", e.to_string());
                None
            }
        }
    };
    errors.finish()?;

    let hits: Vec<SearchHit> = db.search_results(fish_name, prefecture)?.into_iter().map(hit).collect();
    debug!("Search {} in {:?}: {} hit(s)", fish_name, prefecture, hits.len());
    Ok(hits)
}

fn hit(row: SearchRow) -> SearchHit {
    SearchHit {
        result_id: row.result.id,
        image_url: row.result.image.map(|image| format!("{MEDIA_PREFIX}{image}")),
        fish_name: row.result.fish_name,
        trip_id: row.result.trip_id,
        trip_title: row.trip_title,
        prefecture: row.prefecture,
        user_id: row.user_id,
        username: row.username,
        created_at: row.result.created_at,
    }
}

/// Count per calendar month (index 0 is January), read in `offset`.
pub fn monthly_histogram<'a>(timestamps: impl IntoIterator<Item = &'a DateTime<Utc>>, offset: FixedOffset) -> [u32; 12] {
    let mut counts = [0u32; 12];
    for ts in timestamps {
        let month = ts.with_timezone(&offset).month0() as usize;
        counts[month] += 1;
    }
    counts
}

pub fn render_chart(renderer: &dyn ChartRenderer, histogram: &[u32; 12]) -> anyhow::Result<ChartImage> {
    let bytes = renderer.render_bar_chart(&months(), histogram)?;
    Ok(ChartImage {
        content_type: renderer.content_type().to_string(),
        data: STANDARD.encode(bytes),
    })
}

// -- Handlers --

/// GET /trips/search
pub async fn search_form() -> Json<SearchForm> {
    Json(SearchForm {
        prefectures: Prefecture::ALL.to_vec(),
    })
}

/// POST /trips/search
pub async fn search_trips(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let response = run_blocking(&state, move |s| {
        let hits = search(&s.db, &req.fish_name, &req.prefecture)?;
        let histogram = monthly_histogram(hits.iter().map(|h| &h.created_at), s.utc_offset);
        let chart = render_chart(s.chart.as_ref(), &histogram).map_err(ApiError::Internal)?;
        Ok(SearchResponse { hits, histogram, chart })
    })
    .await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use choka_db::TripFields;
    use choka_types::api::NewCatchResult;

    use crate::chart::SvgBarChart;
    use crate::test_support::{state, user};
    use crate::validation::FISH_NAME_MAX;

    fn post(db: &Database, owner: uuid::Uuid, prefecture: Prefecture, fish: &[&str]) {
        let results: Vec<NewCatchResult> = fish
            .iter()
            .map(|name| NewCatchResult {
                fish_name: name.to_string(),
                image: Some(format!("{name}.jpg")),
            })
            .collect();
        let fields = TripFields {
            title: "testtitle1",
            prefecture,
            content: "投稿本文1",
        };
        db.create_trip(owner, &fields, &results).unwrap();
    }

    #[test]
    fn prefecture_narrows_results() {
        let s = state();
        let owner = user(&s, "angler");
        post(&s.db, owner, Prefecture::Hokkaido, &["カレイ"]);
        post(&s.db, owner, Prefecture::Okinawa, &["アジ"]);

        let hokkaido = search(&s.db, "カレイ", "北海道").unwrap();
        assert_eq!(hokkaido.len(), 1);
        assert_eq!(hokkaido[0].username, "angler");
        assert_eq!(hokkaido[0].image_url.as_deref(), Some("/media/カレイ.jpg"));

        assert!(search(&s.db, "カレイ", "沖縄県").unwrap().is_empty());
    }

    #[test]
    fn unfiltered_is_a_superset() {
        let s = state();
        let owner = user(&s, "angler");
        post(&s.db, owner, Prefecture::Hokkaido, &["カレイ"]);
        post(&s.db, owner, Prefecture::Aomori, &["カレイ", "カレイ"]);

        let all = search(&s.db, "カレイ", "").unwrap();
        assert_eq!(all.len(), 3);
        for p in [Prefecture::Hokkaido, Prefecture::Aomori, Prefecture::Tokyo] {
            let subset = search(&s.db, "カレイ", p.as_str()).unwrap();
            assert!(subset.iter().all(|h| all.contains(h)));
            assert!(subset.iter().all(|h| h.prefecture == p));
        }
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn bad_input_is_rejected() {
        let s = state();
        assert!(matches!(search(&s.db, "karei", ""), Err(ApiError::Validation(_))));
        assert!(matches!(search(&s.db, "", ""), Err(ApiError::Validation(_))));
        let Err(ApiError::Validation(errors)) = search(&s.db, "カレイ", "Atlantis") else {
            panic!("expected validation error");
        };
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["prefecture"]);
    }

    #[test]
    fn long_katakana_query_finds_nothing() {
        let s = state();
        let owner = user(&s, "angler");
        post(&s.db, owner, Prefecture::Hokkaido, &["カレイ"]);

        let long = "カ".repeat(FISH_NAME_MAX + 1);
        assert!(search(&s.db, &long, "").unwrap().is_empty());
        assert!(search(&s.db, &long, "北海道").unwrap().is_empty());
    }

    #[test]
    fn histogram_uses_local_month() {
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();
        let stamps = [
            // 2024-01-31 20:00 UTC is already February in Japan.
            Utc.with_ymd_and_hms(2024, 1, 31, 20, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap(),
        ];
        let counts = monthly_histogram(&stamps, jst);
        assert_eq!(counts[0], 2);
        assert_eq!(counts[1], 1);
        assert_eq!(counts[11], 0);

        let utc = FixedOffset::east_opt(0).unwrap();
        let counts = monthly_histogram(&stamps, utc);
        assert_eq!(counts[0], 2);
        assert_eq!(counts[11], 1);
    }

    #[test]
    fn empty_histogram_is_all_zero() {
        let none: Vec<DateTime<Utc>> = Vec::new();
        assert_eq!(monthly_histogram(&none, FixedOffset::east_opt(0).unwrap()), [0; 12]);
    }

    #[test]
    fn histogram_sums_to_hit_count() {
        let s = state();
        let owner = user(&s, "angler");
        post(&s.db, owner, Prefecture::Hokkaido, &["カレイ", "カレイ", "アジ"]);

        let hits = search(&s.db, "カレイ", "").unwrap();
        let histogram = monthly_histogram(hits.iter().map(|h| &h.created_at), s.utc_offset);
        assert_eq!(histogram.iter().sum::<u32>(), hits.len() as u32);
    }

    #[test]
    fn chart_is_base64_svg() {
        let image = render_chart(&SvgBarChart::default(), &[1; 12]).unwrap();
        assert_eq!(image.content_type, "image/svg+xml");
        let decoded = STANDARD.decode(&image.data).unwrap();
        assert!(decoded.starts_with(b"<svg"));
    }
}
