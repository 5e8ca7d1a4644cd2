#![forbid(unsafe_code)]

use cx_kernel_contracts::catalog::RepositoryInfo;
use cx_kernel_contracts::gate::{BlockingItem, CloseValidationReport};
use cx_kernel_contracts::order::OrderRecord;
use cx_kernel_contracts::replog::RepoConfirmationRecord;
use cx_kernel_contracts::session::{CxSessionRecord, SessionStatus};

/// Close validation gate. Categories are checked in order and the first
/// failing category short-circuits the rest, but every blocking item inside
/// that category is reported:
///   1. the session must not already be terminal;
///   2. the session must be in a close phase;
///   3. every order referencing the session must be terminal;
///   4. every float-count-required repository must be close-confirmed.
pub fn evaluate(
    session: &CxSessionRecord,
    orders: &[&OrderRecord],
    repositories: &[&RepositoryInfo],
    confirmations: &[&RepoConfirmationRecord],
) -> CloseValidationReport {
    if session.status.is_terminal() {
        return CloseValidationReport::blocked(vec![BlockingItem::session(
            &session.session_id,
            session.status,
        )]);
    }

    if !matches!(
        session.status,
        SessionStatus::FloatCloseStart | SessionStatus::FloatCloseComplete
    ) {
        return CloseValidationReport::blocked(vec![BlockingItem::session(
            &session.session_id,
            session.status,
        )]);
    }

    let open_orders: Vec<BlockingItem> = orders
        .iter()
        .filter(|o| !o.status.is_terminal())
        .map(|o| BlockingItem::order(&o.order_id, o.status))
        .collect();
    if !open_orders.is_empty() {
        return CloseValidationReport::blocked(open_orders);
    }

    let unconfirmed: Vec<BlockingItem> = repositories
        .iter()
        .filter(|r| r.float_count_required)
        .filter(|r| {
            !confirmations
                .iter()
                .any(|c| c.repository_id == r.repository_id && c.close_confirmed())
        })
        .map(|r| BlockingItem::repository(&r.repository_id))
        .collect();
    if !unconfirmed.is_empty() {
        return CloseValidationReport::blocked(unconfirmed);
    }

    CloseValidationReport::clear()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use cx_kernel_contracts::catalog::RepositoryInfo;
    use cx_kernel_contracts::float::{RepositoryId, Ticker};
    use cx_kernel_contracts::order::{OrderId, OrderStatus};
    use cx_kernel_contracts::session::{OrgId, SessionId, UserId};
    use cx_kernel_contracts::MonotonicTimeNs;

    fn session(status: SessionStatus) -> CxSessionRecord {
        let mut s = CxSessionRecord::dormant_v1(
            SessionId::new("cxs_1").unwrap(),
            OrgId::new("org_demo").unwrap(),
            UserId::new("user_owner").unwrap(),
            MonotonicTimeNs(1_000),
        )
        .unwrap();
        s.status = status;
        if status == SessionStatus::Closed {
            s.open_start_dt = Some(MonotonicTimeNs(1_100));
            s.close_start_dt = Some(MonotonicTimeNs(1_200));
            s.close_confirm_dt = Some(MonotonicTimeNs(1_300));
        }
        s
    }

    fn order(id: &str, status: OrderStatus) -> OrderRecord {
        OrderRecord::v1(
            OrderId::new(id).unwrap(),
            SessionId::new("cxs_1").unwrap(),
            status,
        )
        .unwrap()
    }

    fn repository(id: &str, float_count_required: bool) -> RepositoryInfo {
        RepositoryInfo::v1(
            RepositoryId::new(id).unwrap(),
            OrgId::new("org_demo").unwrap(),
            "till drawer",
            true,
            float_count_required,
            vec![Ticker::new("USD").unwrap()],
        )
        .unwrap()
    }

    fn confirmed(id: &str) -> RepoConfirmationRecord {
        let mut c = RepoConfirmationRecord::opened_v1(
            SessionId::new("cxs_1").unwrap(),
            RepositoryId::new(id).unwrap(),
            MonotonicTimeNs(10),
            BTreeSet::new(),
        )
        .unwrap();
        c.close_start_dt = Some(MonotonicTimeNs(20));
        c.close_confirm_dt = Some(MonotonicTimeNs(30));
        c
    }

    #[test]
    fn at_close_gate_01_terminal_session_blocks_immediately() {
        let s = session(SessionStatus::Closed);
        let report = evaluate(&s, &[], &[], &[]);
        assert!(!report.can_close);
        assert!(matches!(
            report.blocking_items[0],
            BlockingItem::Session { .. }
        ));
    }

    #[test]
    fn at_close_gate_02_wrong_phase_blocks_with_session_item() {
        let s = session(SessionStatus::FloatOpenComplete);
        let report = evaluate(&s, &[], &[], &[]);
        assert!(!report.can_close);
        assert_eq!(report.blocking_items.len(), 1);
    }

    #[test]
    fn at_close_gate_03_open_orders_block_and_all_are_reported() {
        let s = session(SessionStatus::FloatCloseStart);
        let o1 = order("ord_1", OrderStatus::Accepted);
        let o2 = order("ord_2", OrderStatus::Draft);
        let o3 = order("ord_3", OrderStatus::Completed);
        let repo = repository("repo_till", true);
        let report = evaluate(&s, &[&o1, &o2, &o3], &[&repo], &[]);
        assert!(!report.can_close);
        assert_eq!(report.blocking_items.len(), 2);
        assert!(report
            .blocking_items
            .iter()
            .all(|b| matches!(b, BlockingItem::Order { .. })));
    }

    #[test]
    fn at_close_gate_04_order_category_short_circuits_repositories() {
        let s = session(SessionStatus::FloatCloseStart);
        let o = order("ord_1", OrderStatus::Accepted);
        let repo = repository("repo_till", true);
        // Repository unconfirmed too, but only the order category reports.
        let report = evaluate(&s, &[&o], &[&repo], &[]);
        assert_eq!(report.blocking_items.len(), 1);
        assert!(matches!(report.blocking_items[0], BlockingItem::Order { .. }));
    }

    #[test]
    fn at_close_gate_05_unconfirmed_required_repository_blocks() {
        let s = session(SessionStatus::FloatCloseComplete);
        let repo = repository("repo_till", true);
        let report = evaluate(&s, &[], &[&repo], &[]);
        assert!(!report.can_close);
        assert!(matches!(
            report.blocking_items[0],
            BlockingItem::Repository { .. }
        ));

        let conf = confirmed("repo_till");
        let report = evaluate(&s, &[], &[&repo], &[&conf]);
        assert!(report.can_close);
        assert!(report.blocking_items.is_empty());
    }

    #[test]
    fn at_close_gate_06_count_not_required_repository_is_exempt() {
        let s = session(SessionStatus::FloatCloseStart);
        let required = repository("repo_till", true);
        let exempt = repository("repo_display_case", false);
        let conf = confirmed("repo_till");
        let report = evaluate(&s, &[], &[&required, &exempt], &[&conf]);
        assert!(report.can_close);
    }

    #[test]
    fn at_close_gate_07_terminal_orders_do_not_block() {
        let s = session(SessionStatus::FloatCloseStart);
        let o1 = order("ord_1", OrderStatus::Completed);
        let o2 = order("ord_2", OrderStatus::Cancelled);
        let report = evaluate(&s, &[&o1, &o2], &[], &[]);
        assert!(report.can_close);
    }
}
