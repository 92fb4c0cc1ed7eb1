//! Graph-optimised settlement.
//!
//! Debts are modelled as a directed graph (`debtor -> creditor`) and reduced
//! in three passes: mutual debts are netted, closed loops are cancelled, and
//! middlemen are bypassed where the debtor already owes the final creditor.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::event::{Activity, ConsumedItem, ConsumptionDetail, Settlement};
use crate::money::Money;

/// Edge weights at or below this are treated as settled.
const DUST: Money = Money::from_cents(1);

/// `graph[from][to]` is the amount `from` owes `to`.
type DebtGraph = BTreeMap<String, BTreeMap<String, Money>>;

/// Minimal set of transfers that settles every activity, largest first.
pub fn smart_split(activities: &[Activity]) -> Vec<Settlement> {
    let graph = build_debt_graph(activities);
    let graph = net_mutual_debts(&graph);
    let graph = eliminate_cycles(graph);
    let graph = bypass_middlemen(graph);

    let mut settlements: Vec<Settlement> = graph
        .into_iter()
        .flat_map(|(from, edges)| {
            edges.into_iter().filter(|(_, amount)| *amount > DUST).map(move |(to, amount)| {
                Settlement { from: from.clone(), to, amount: amount.round() }
            })
        })
        .collect();

    settlements.sort_by(|a, b| b.amount.cmp(&a.amount));
    debug!(count = settlements.len(), "smart split settled");
    settlements
}

/// How much each person consumed across all activities, regardless of who
/// paid. Sorted by total, largest first.
pub fn consumption_details(activities: &[Activity]) -> Vec<ConsumptionDetail> {
    let mut details: BTreeMap<&str, ConsumptionDetail> = BTreeMap::new();

    for activity in activities {
        for item in &activity.items {
            let per_person = item.per_person();
            for member in &item.members {
                let detail = details
                    .entry(member.as_str())
                    .or_insert_with(|| ConsumptionDetail::new(member.as_str()));
                detail.total += per_person;
                detail.items.push(ConsumedItem {
                    item_name: item.name.clone(),
                    activity_title: activity.title.clone(),
                    price: item.price,
                    quantity: item.quantity,
                    split_amount: per_person.round(),
                });
            }
        }
    }

    let mut out: Vec<ConsumptionDetail> = details
        .into_values()
        .map(|mut d| {
            d.total = d.total.round();
            d
        })
        .collect();
    out.sort_by(|a, b| b.total.cmp(&a.total));
    out
}

fn build_debt_graph(activities: &[Activity]) -> DebtGraph {
    let mut graph = DebtGraph::new();

    for activity in activities {
        for item in &activity.items {
            let per_person = item.per_person();
            if per_person <= Money::ZERO {
                continue;
            }
            for member in &item.members {
                if *member == activity.payer {
                    continue;
                }
                *graph
                    .entry(member.clone())
                    .or_default()
                    .entry(activity.payer.clone())
                    .or_default() += per_person;
            }
        }
    }

    graph
}

fn edge(graph: &DebtGraph, from: &str, to: &str) -> Money {
    graph
        .get(from)
        .and_then(|edges| edges.get(to))
        .copied()
        .unwrap_or(Money::ZERO)
}

/// Sets `from -> to`, dropping the edge (and an emptied node) when it falls
/// to dust.
fn set_edge(graph: &mut DebtGraph, from: &str, to: &str, amount: Money) {
    if amount <= DUST {
        if let Some(edges) = graph.get_mut(from) {
            edges.remove(to);
            if edges.is_empty() {
                graph.remove(from);
            }
        }
    } else {
        graph.entry(from.to_string()).or_default().insert(to.to_string(), amount);
    }
}

/// Replaces every `A -> B` / `B -> A` pair with a single net edge.
fn net_mutual_debts(graph: &DebtGraph) -> DebtGraph {
    let mut netted = DebtGraph::new();
    let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();

    for (from, edges) in graph {
        for (to, amount) in edges {
            let pair = if from < to {
                (from.as_str(), to.as_str())
            } else {
                (to.as_str(), from.as_str())
            };
            if !seen.insert(pair) {
                continue;
            }

            let net = *amount - edge(graph, to, from);
            if net.abs() > DUST {
                let (debtor, creditor) = if net > Money::ZERO { (from, to) } else { (to, from) };
                netted
                    .entry(debtor.clone())
                    .or_default()
                    .insert(creditor.clone(), net.abs());
            }
        }
    }

    netted
}

fn find_cycle(graph: &DebtGraph) -> Option<Vec<String>> {
    let nodes: BTreeSet<&str> = graph
        .iter()
        .flat_map(|(from, edges)| {
            std::iter::once(from.as_str()).chain(edges.keys().map(String::as_str))
        })
        .collect();

    for start in nodes {
        let mut path = Vec::new();
        if let Some(cycle) = walk(graph, start, &mut path) {
            if cycle.len() >= 2 {
                return Some(cycle);
            }
        }
    }
    None
}

/// Depth-first walk; `path` doubles as the on-stack set.
fn walk<'a>(graph: &'a DebtGraph, node: &'a str, path: &mut Vec<&'a str>) -> Option<Vec<String>> {
    if let Some(idx) = path.iter().position(|n| *n == node) {
        return Some(path[idx..].iter().map(|n| n.to_string()).collect());
    }

    path.push(node);
    if let Some(edges) = graph.get(node) {
        for (next, weight) in edges {
            if *weight > DUST {
                if let Some(cycle) = walk(graph, next.as_str(), path) {
                    return Some(cycle);
                }
            }
        }
    }
    path.pop();
    None
}

/// Cancels the smallest edge of each cycle around the loop until the graph
/// is acyclic. Every round removes at least one edge.
fn eliminate_cycles(mut graph: DebtGraph) -> DebtGraph {
    while let Some(cycle) = find_cycle(&graph) {
        let hops: Vec<(&str, &str)> = cycle
            .iter()
            .zip(cycle.iter().cycle().skip(1))
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();

        let Some(min) = hops.iter().map(|(a, b)| edge(&graph, a, b)).min() else {
            break;
        };
        if min <= DUST {
            break;
        }

        debug!(len = cycle.len(), amount = %min, "cancelling debt cycle");
        for (a, b) in &hops {
            let updated = edge(&graph, a, b) - min;
            set_edge(&mut graph, a, b, updated);
        }
    }
    graph
}

fn find_triangle(graph: &DebtGraph) -> Option<(String, String, String)> {
    for (a, a_edges) in graph {
        for (b, ab) in a_edges {
            if *ab <= DUST {
                continue;
            }
            let Some(b_edges) = graph.get(b) else {
                continue;
            };
            for (c, bc) in b_edges {
                if *bc <= DUST || c == a {
                    continue;
                }
                if a_edges.get(c).is_some_and(|ac| *ac > DUST) {
                    return Some((a.clone(), b.clone(), c.clone()));
                }
            }
        }
    }
    None
}

/// For `A -> B -> C` where `A -> C` already exists, moves
/// `min(A->B, B->C)` onto `A -> C`. Each round zeroes one of the two legs.
fn bypass_middlemen(mut graph: DebtGraph) -> DebtGraph {
    while let Some((a, b, c)) = find_triangle(&graph) {
        let ab = edge(&graph, &a, &b);
        let bc = edge(&graph, &b, &c);
        let ac = edge(&graph, &a, &c);
        let reroute = ab.min(bc);

        set_edge(&mut graph, &a, &b, ab - reroute);
        set_edge(&mut graph, &b, &c, bc - reroute);
        set_edge(&mut graph, &a, &c, ac + reroute);
    }
    graph
}
