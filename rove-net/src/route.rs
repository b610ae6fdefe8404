use rove_smt::{Sort, Term};

/// The record sort routes are drawn from, plus the operations every
/// network needs over it: a default (worst) route and a binary
/// preference-order merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteType {
    sort: Sort,
}

impl RouteType {
    pub fn new(sort: Sort) -> RouteType {
        RouteType { sort }
    }

    /// The standard BGP-style route record: administrative distance, local
    /// preference, AS-path length, MED and origin type as integers, plus a
    /// community-tag string set.
    pub fn bgp() -> RouteType {
        RouteType::new(Sort::record(vec![
            ("adminDist".to_string(), Sort::Int),
            ("asPathLength".to_string(), Sort::Int),
            ("communities".to_string(), Sort::Set),
            ("lp".to_string(), Sort::Int),
            ("med".to_string(), Sort::Int),
            ("originType".to_string(), Sort::Int),
        ]))
    }

    /// A plain boolean "reached" flag, enough for reachability networks.
    pub fn boolean() -> RouteType {
        RouteType::new(Sort::Bool)
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// The all-defaults route (zero integers, empty set).
    pub fn default_route(&self) -> Term {
        Term::default_of(&self.sort)
    }

    /// Select the preferred of two routes. For the BGP record this is the
    /// decision-process order: lowest administrative distance, then highest
    /// local preference, then shortest AS path, then lowest MED. Ties keep
    /// the left operand. For non-record sorts it is boolean-or style
    /// "any route wins": `ite(a = default, b, a)`.
    pub fn merge(&self, a: &Term, b: &Term) -> Term {
        match &self.sort {
            Sort::Record(fields) if fields.iter().any(|(name, _)| name == "adminDist") => {
                let get = |r: &Term, f: &str| Term::get_field(r.clone(), f);
                let prefer_low =
                    |f: &str| Term::lt(get(a, f), get(b, f));
                let tie = |f: &str| Term::eq(get(a, f), get(b, f));
                let pick_a = Term::or(
                    prefer_low("adminDist"),
                    Term::and(
                        tie("adminDist"),
                        Term::or(
                            Term::lt(get(b, "lp"), get(a, "lp")),
                            Term::and(
                                tie("lp"),
                                Term::or(
                                    prefer_low("asPathLength"),
                                    Term::and(
                                        tie("asPathLength"),
                                        Term::le(get(a, "med"), get(b, "med")),
                                    ),
                                ),
                            ),
                        ),
                    ),
                );
                Term::ite(pick_a, a.clone(), b.clone())
            }
            sort => Term::ite(
                Term::eq(a.clone(), Term::default_of(sort)),
                b.clone(),
                a.clone(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rove_smt::{Model, Value};

    fn bgp_route(admin: i64, lp: i64, len: i64, med: i64) -> Term {
        Term::record(vec![
            ("adminDist".to_string(), Term::Int(admin)),
            ("asPathLength".to_string(), Term::Int(len)),
            ("communities".to_string(), Term::EmptySet),
            ("lp".to_string(), Term::Int(lp)),
            ("med".to_string(), Term::Int(med)),
            ("originType".to_string(), Term::Int(0)),
        ])
    }

    fn merged(a: &Term, b: &Term) -> Value {
        RouteType::bgp().merge(a, b).eval(&Model::new()).unwrap()
    }

    #[test]
    fn lower_admin_distance_wins() {
        let a = bgp_route(10, 0, 5, 0);
        let b = bgp_route(20, 200, 1, 0);
        assert_eq!(merged(&a, &b), a.eval(&Model::new()).unwrap());
        assert_eq!(merged(&b, &a), a.eval(&Model::new()).unwrap());
    }

    #[test]
    fn higher_local_preference_breaks_admin_ties() {
        let a = bgp_route(20, 100, 5, 0);
        let b = bgp_route(20, 200, 9, 0);
        assert_eq!(merged(&a, &b), b.eval(&Model::new()).unwrap());
    }

    #[test]
    fn shorter_as_path_breaks_lp_ties() {
        let a = bgp_route(20, 100, 2, 50);
        let b = bgp_route(20, 100, 4, 0);
        assert_eq!(merged(&a, &b), a.eval(&Model::new()).unwrap());
    }

    #[test]
    fn merge_order_does_not_matter_on_distinguishable_routes() {
        let samples = [
            bgp_route(0, 0, 0, 0),
            bgp_route(1, 100, 3, 7),
            bgp_route(1, 100, 3, 8),
            bgp_route(1, 200, 9, 0),
            bgp_route(5, 0, 1, 1),
        ];
        for a in &samples {
            for b in &samples {
                assert_eq!(merged(a, b), merged(b, a), "merge({a:?}, {b:?})");
            }
        }
    }

    #[test]
    fn boolean_routes_merge_by_or() {
        let rt = RouteType::boolean();
        let yes = Term::Bool(true);
        let no = Term::Bool(false);
        let m = |a: &Term, b: &Term| rt.merge(a, b).eval(&Model::new()).unwrap();
        assert_eq!(m(&no, &yes), Value::Bool(true));
        assert_eq!(m(&yes, &no), Value::Bool(true));
        assert_eq!(m(&no, &no), Value::Bool(false));
    }
}
