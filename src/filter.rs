//! Typed order search filter for Square's `SearchOrders` endpoint.
//!
//! [`OrderFilter`] holds named fields (states, locations, window) and is
//! only turned into Square's nested JSON shape by [`OrderFilter::to_search_body`],
//! at the HTTP boundary.

use serde::Serialize;

use crate::models::format_ts;
use crate::window::TimeWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderFilter {
    pub window: TimeWindow,
    /// Order states to include (`COMPLETED`, `OPEN`, ...). Empty means all.
    pub states: Vec<String>,
    /// Locations to search. Empty omits the field from the request body;
    /// configured runs always carry 1 to 10 ids.
    pub location_ids: Vec<String>,
}

impl OrderFilter {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            states: Vec::new(),
            location_ids: Vec::new(),
        }
    }

    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_locations<I, S>(mut self, location_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.location_ids = location_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Build the request body for one page of results.
    pub fn to_search_body<'a>(
        &'a self,
        limit: u32,
        cursor: Option<&'a str>,
    ) -> SearchOrdersBody<'a> {
        SearchOrdersBody {
            location_ids: &self.location_ids,
            limit,
            cursor,
            return_entries: false,
            query: SearchQuery {
                filter: SearchFilter {
                    date_time_filter: DateTimeFilter {
                        created_at: TimeRange {
                            start_at: format_ts(&self.window.start),
                            end_at: format_ts(&self.window.end),
                        },
                    },
                    state_filter: if self.states.is_empty() {
                        None
                    } else {
                        Some(StateFilter {
                            states: &self.states,
                        })
                    },
                },
                sort: SearchSort {
                    sort_field: "CREATED_AT",
                    sort_order: "ASC",
                },
            },
        }
    }
}

// ============ Wire shape ============

/// JSON body of a `SearchOrders` request.
#[derive(Serialize)]
pub struct SearchOrdersBody<'a> {
    #[serde(skip_serializing_if = "is_empty")]
    location_ids: &'a [String],
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    return_entries: bool,
    query: SearchQuery<'a>,
}

fn is_empty(ids: &&[String]) -> bool {
    ids.is_empty()
}

#[derive(Serialize)]
struct SearchQuery<'a> {
    filter: SearchFilter<'a>,
    sort: SearchSort,
}

#[derive(Serialize)]
struct SearchFilter<'a> {
    date_time_filter: DateTimeFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_filter: Option<StateFilter<'a>>,
}

#[derive(Serialize)]
struct DateTimeFilter {
    created_at: TimeRange,
}

#[derive(Serialize)]
struct TimeRange {
    start_at: String,
    end_at: String,
}

#[derive(Serialize)]
struct StateFilter<'a> {
    states: &'a [String],
}

#[derive(Serialize)]
struct SearchSort {
    sort_field: &'static str,
    sort_order: &'static str,
}
