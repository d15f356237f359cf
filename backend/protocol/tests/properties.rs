//! Property tests for the query encoding and the response envelope.

use proptest::prelude::*;
use protocol::{
    Collection, ColumnFilters, FilterValue, Limits, QueryState, RawPage, SortDirection, SortSpec,
    decode, encode, normalize,
};

const LEVELS: [&str; 3] = ["beginner", "intermediate", "advanced"];

fn sort_strategy() -> impl Strategy<Value = Vec<SortSpec>> {
    proptest::collection::vec(("[a-zA-Z_]{1,12}", any::<bool>()), 0..4).prop_map(|specs| {
        specs
            .into_iter()
            .map(|(column_id, descending)| SortSpec {
                column_id,
                direction: if descending {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
            })
            .collect()
    })
}

fn course_filters() -> impl Strategy<Value = ColumnFilters> {
    (
        proptest::option::of(".*"),
        proptest::option::of(any::<i64>()),
        proptest::option::of(any::<bool>()),
        proptest::option::of(proptest::sample::subsequence(LEVELS.to_vec(), 1..=3)),
        proptest::option::of(any::<i64>()),
    )
        .prop_map(|(slug, price, published, levels, id)| {
            let mut filters = ColumnFilters::new();
            if let Some(slug) = slug {
                filters.insert("slug".to_string(), FilterValue::Text(slug));
            }
            if let Some(price) = price {
                filters.insert("priceCents".to_string(), FilterValue::Integer(price));
            }
            if let Some(published) = published {
                filters.insert("published".to_string(), FilterValue::Bool(published));
            }
            if let Some(levels) = levels {
                filters.insert(
                    "level".to_string(),
                    FilterValue::OneOf(levels.into_iter().map(str::to_string).collect()),
                );
            }
            if let Some(id) = id {
                filters.insert("id".to_string(), FilterValue::Integer(id));
            }
            filters
        })
}

prop_compose! {
    fn course_state()(
        page_index in any::<u32>(),
        page_size in 1u32..=100,
        sort in sort_strategy(),
        column_filters in course_filters(),
        search_value in ".*",
    ) -> QueryState {
        QueryState { page_index, page_size, sort, column_filters, search_value }
    }
}

proptest! {
    #[test]
    fn encode_then_decode_is_identity(state in course_state()) {
        let params = encode(&state, Collection::Courses).unwrap();
        let decoded = decode(&params, Collection::Courses, Limits::default()).unwrap();

        prop_assert_eq!(decoded, state);
    }

    #[test]
    fn encoding_is_deterministic(state in course_state()) {
        prop_assert_eq!(
            encode(&state, Collection::Courses),
            encode(&state.clone(), Collection::Courses)
        );
    }

    #[test]
    fn envelope_respects_page_bounds(
        total_count in 0u64..10_000,
        page_size in 1u32..=100,
        page_index in 0u32..200,
    ) {
        let offset = u64::from(page_index) * u64::from(page_size);
        let rows = total_count.saturating_sub(offset).min(u64::from(page_size));
        let raw = RawPage { rows: (0..rows).collect::<Vec<_>>(), total_count };

        let envelope = normalize(page_index, page_size, Ok(raw)).unwrap();

        prop_assert!(envelope.data.len() <= page_size as usize);
        prop_assert_eq!(envelope.page_count, total_count.div_ceil(u64::from(page_size)));
        prop_assert_eq!(envelope.page_count == 0, total_count == 0);
        prop_assert_eq!(envelope.pagination.total_pages, envelope.page_count);
    }
}
