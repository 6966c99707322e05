use bigdecimal::{BigDecimal, Zero};
use costwise_common::{Architecture, ComparisonType, CostAlternative, Server, ServerType};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

const MONTHS_PER_YEAR: u32 = 12;

/// Ranked cheaper alternatives for `server` taken from `catalog`.
///
/// A candidate qualifies when its monthly price is strictly lower than the current one and its
/// cores, memory and disk are all at least the current values. Results are ordered by monthly
/// savings, highest first; equal savings keep catalog order.
///
/// Prices are the first quote's monthly gross amount. A candidate without a parseable price is
/// skipped, and a server whose own type has no parseable price gets no alternatives: an unknown
/// price is never treated as free.
pub fn find_alternatives(server: &Server, catalog: &[ServerType]) -> Vec<CostAlternative> {
    let current = &server.server_type;
    let Some(current_price) = current.monthly_price() else {
        debug!(
            "server {} ({}) has no monthly price, skipping alternative search",
            server.id, current.name
        );
        return Vec::new();
    };

    let mut alternatives: Vec<CostAlternative> = catalog
        .iter()
        .filter_map(|candidate| {
            let price = candidate.monthly_price()?;
            if price >= current_price || !meets_specs(candidate, current) {
                return None;
            }
            let monthly_savings = &current_price - &price;
            let yearly_potential_savings = &monthly_savings * &BigDecimal::from(MONTHS_PER_YEAR);
            Some(CostAlternative {
                comparison_type: compare(candidate, current),
                architecture: candidate.architecture(),
                server_type: candidate.clone(),
                monthly_savings,
                yearly_potential_savings,
            })
        })
        .collect();

    // sort_by is stable: ties keep catalog order.
    alternatives.sort_by(|a, b| b.monthly_savings.cmp(&a.monthly_savings));
    alternatives
}

fn meets_specs(candidate: &ServerType, current: &ServerType) -> bool {
    candidate.cores >= current.cores
        && candidate.memory >= current.memory
        && candidate.disk >= current.disk
}

fn compare(candidate: &ServerType, current: &ServerType) -> ComparisonType {
    if candidate.cores > current.cores
        || candidate.memory > current.memory
        || candidate.disk > current.disk
    {
        ComparisonType::Better
    } else {
        ComparisonType::Same
    }
}

/// Fleet-level numbers shown above the server list.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FleetSummary {
    pub servers_with_alternatives: usize,
    pub total_alternatives: usize,
    /// Sum over servers of their best alternative's monthly savings.
    pub best_monthly_savings: BigDecimal,
    pub best_yearly_savings: BigDecimal,
    /// At least one alternative is ARM: the operator must review compatibility.
    pub has_arm_alternatives: bool,
}

pub fn summarize(alternatives_by_server: &HashMap<u64, Vec<CostAlternative>>) -> FleetSummary {
    let mut summary = FleetSummary {
        servers_with_alternatives: 0,
        total_alternatives: 0,
        best_monthly_savings: BigDecimal::zero(),
        best_yearly_savings: BigDecimal::zero(),
        has_arm_alternatives: false,
    };
    for alts in alternatives_by_server.values() {
        let Some(best) = alts.first() else {
            continue;
        };
        summary.servers_with_alternatives += 1;
        summary.total_alternatives += alts.len();
        summary.best_monthly_savings += &best.monthly_savings;
        summary.has_arm_alternatives |= alts
            .iter()
            .any(|a| a.architecture == Architecture::Arm);
    }
    summary.best_yearly_savings =
        &summary.best_monthly_savings * &BigDecimal::from(MONTHS_PER_YEAR);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use costwise_common::{Datacenter, Location, Price, PriceQuote, ServerStatus};
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn ty(id: u64, name: &str, cores: u32, memory: f64, disk: u64, price: Option<&str>) -> ServerType {
        ServerType {
            id,
            name: name.to_string(),
            description: String::new(),
            cores,
            memory,
            disk,
            prices: price
                .map(|p| {
                    vec![PriceQuote {
                        location: "fsn1".into(),
                        price_hourly: Price { net: "0".into(), gross: "0".into() },
                        price_monthly: Price { net: p.into(), gross: p.into() },
                    }]
                })
                .unwrap_or_default(),
        }
    }

    fn srv(server_type: ServerType) -> Server {
        Server {
            id: 1,
            name: "web".into(),
            status: ServerStatus::Running,
            server_type,
            datacenter: Datacenter {
                id: 1,
                name: "fsn1-dc14".into(),
                location: Location {
                    id: 1,
                    name: "fsn1".into(),
                    city: String::new(),
                    country: String::new(),
                },
            },
            image: None,
            created: chrono::Utc::now(),
        }
    }

    #[test]
    fn reference_scenario() {
        let server = srv(ty(0, "cx-current", 2, 4.0, 40, Some("20.00")));
        let catalog = vec![
            ty(1, "a", 4, 8.0, 40, Some("15.00")),
            ty(2, "b", 4, 8.0, 80, Some("20.00")),
            ty(3, "c", 2, 4.0, 40, Some("18.00")),
        ];

        let alts = find_alternatives(&server, &catalog);

        assert_eq!(alts.len(), 2);
        assert_eq!(alts[0].server_type.name, "a");
        assert_eq!(alts[0].comparison_type, ComparisonType::Better);
        assert_eq!(alts[0].monthly_savings, dec("5.00"));
        assert_eq!(alts[0].yearly_potential_savings, dec("60.00"));
        assert_eq!(alts[1].server_type.name, "c");
        assert_eq!(alts[1].comparison_type, ComparisonType::Same);
        assert_eq!(alts[1].monthly_savings, dec("2.00"));
    }

    #[test]
    fn weaker_specs_on_any_axis_are_rejected() {
        let server = srv(ty(0, "cur", 4, 8.0, 80, Some("20")));
        let catalog = vec![
            ty(1, "few-cores", 2, 8.0, 80, Some("5")),
            ty(2, "low-mem", 4, 4.0, 80, Some("5")),
            ty(3, "small-disk", 4, 8.0, 40, Some("5")),
        ];
        assert!(find_alternatives(&server, &catalog).is_empty());
    }

    #[test]
    fn equal_savings_keep_catalog_order() {
        let server = srv(ty(0, "cur", 2, 4.0, 40, Some("10")));
        let catalog = vec![
            ty(1, "first", 2, 4.0, 40, Some("6")),
            ty(2, "bigger", 8, 16.0, 160, Some("2")),
            ty(3, "second", 4, 4.0, 40, Some("6")),
            ty(4, "third", 2, 8.0, 40, Some("6.0000")),
        ];
        let names: Vec<_> = find_alternatives(&server, &catalog)
            .into_iter()
            .map(|a| a.server_type.name)
            .collect();
        assert_eq!(names, vec!["bigger", "first", "second", "third"]);
    }

    #[test]
    fn unpriced_types_never_qualify() {
        let server = srv(ty(0, "cur", 2, 4.0, 40, Some("10")));
        let catalog = vec![
            ty(1, "no-quote", 4, 8.0, 80, None),
            ty(2, "garbage", 4, 8.0, 80, Some("n/a")),
        ];
        assert!(find_alternatives(&server, &catalog).is_empty());

        let unpriced = srv(ty(0, "cur", 2, 4.0, 40, None));
        let catalog = vec![ty(1, "cheap", 4, 8.0, 80, Some("1"))];
        assert!(find_alternatives(&unpriced, &catalog).is_empty());
    }

    #[test]
    fn arm_candidates_are_tagged() {
        let server = srv(ty(0, "cpx21", 3, 4.0, 80, Some("8.91")));
        let catalog = vec![ty(1, "CAX21", 4, 8.0, 80, Some("7.72"))];
        let alts = find_alternatives(&server, &catalog);
        assert_eq!(alts[0].architecture, Architecture::Arm);
    }

    #[test]
    fn summary_counts_best_alternative_per_server() {
        let server = srv(ty(0, "cur", 2, 4.0, 40, Some("10")));
        let catalog = vec![
            ty(1, "x", 2, 4.0, 40, Some("7")),
            ty(2, "cax11", 2, 4.0, 40, Some("9")),
        ];
        let mut by_server = HashMap::new();
        by_server.insert(1, find_alternatives(&server, &catalog));
        by_server.insert(2, Vec::new());

        let summary = summarize(&by_server);
        assert_eq!(summary.servers_with_alternatives, 1);
        assert_eq!(summary.total_alternatives, 2);
        assert_eq!(summary.best_monthly_savings, dec("3"));
        assert_eq!(summary.best_yearly_savings, dec("36"));
        assert!(summary.has_arm_alternatives);
    }

    #[test]
    fn repeated_calls_give_the_same_result() {
        let server = srv(ty(0, "cpx31", 4, 8.0, 80, Some("16.41")));
        let catalog = vec![
            ty(1, "cx32", 4, 8.0, 80, Some("7.72")),
            ty(2, "cax21", 4, 8.0, 80, Some("7.72")),
            ty(3, "cax31", 8, 16.0, 160, Some("15.59")),
            ty(4, "cpx21", 3, 4.0, 80, Some("8.91")),
        ];
        let first = find_alternatives(&server, &catalog);
        let second = find_alternatives(&server, &catalog);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    /// (cores, memory GB, disk GB, monthly price in cents)
    fn sizing_strategy() -> impl Strategy<Value = (u32, u32, u64, u32)> {
        (1u32..=16, 1u32..=64, 20u64..=320, 100u32..=5000)
    }

    fn priced(id: u64, (cores, memory, disk, cents): (u32, u32, u64, u32)) -> ServerType {
        let price = format!("{}.{:02}", cents / 100, cents % 100);
        ty(id, &format!("t{id}"), cores, f64::from(memory), disk, Some(&price))
    }

    proptest! {
        #[test]
        fn prop_alternatives_are_cheaper_and_at_least_as_big(
            current in sizing_strategy(),
            candidates in prop::collection::vec(sizing_strategy(), 0..24),
        ) {
            let server = srv(priced(0, current));
            let catalog: Vec<ServerType> = candidates
                .into_iter()
                .enumerate()
                .map(|(i, c)| priced(i as u64 + 1, c))
                .collect();
            let current_price = server.server_type.monthly_price().unwrap();

            let alts = find_alternatives(&server, &catalog);

            for alt in &alts {
                let t = &alt.server_type;
                let cur = &server.server_type;
                prop_assert!(t.monthly_price().unwrap() < current_price);
                prop_assert!(t.cores >= cur.cores && t.memory >= cur.memory && t.disk >= cur.disk);
                prop_assert!(alt.monthly_savings > BigDecimal::zero());
                prop_assert_eq!(
                    &alt.monthly_savings,
                    &(&current_price - &t.monthly_price().unwrap())
                );
                let bigger = t.cores > cur.cores || t.memory > cur.memory || t.disk > cur.disk;
                prop_assert_eq!(alt.comparison_type == ComparisonType::Better, bigger);
            }
            for pair in alts.windows(2) {
                prop_assert!(pair[0].monthly_savings >= pair[1].monthly_savings);
                if pair[0].monthly_savings == pair[1].monthly_savings {
                    prop_assert!(pair[0].server_type.id < pair[1].server_type.id);
                }
            }

            let qualifying = catalog
                .iter()
                .filter(|t| {
                    t.monthly_price().unwrap() < current_price && meets_specs(t, &server.server_type)
                })
                .count();
            prop_assert_eq!(alts.len(), qualifying);
            prop_assert_eq!(find_alternatives(&server, &catalog), alts);
        }
    }
}
