//! Field mapping between the tickets and board vocabularies.
//!
//! Every lookup is total: tokens missing from a vocabulary degrade to the
//! configured default instead of failing, so a status added on either
//! backend after deployment never aborts a pass.

use tracklink_core::{CounterpartFields, Item, MappingConfig, Side};

/// Pure translation between the two backends' fields.
#[derive(Debug, Clone)]
pub struct FieldMapper {
    mapping: MappingConfig,
    tickets_name: String,
    board_name: String,
}

impl FieldMapper {
    /// `tickets_name` / `board_name` label imported items ("JIRA", "ClickUp").
    pub fn new(
        mapping: MappingConfig,
        tickets_name: impl Into<String>,
        board_name: impl Into<String>,
    ) -> Self {
        Self {
            mapping,
            tickets_name: tickets_name.into(),
            board_name: board_name.into(),
        }
    }

    /// Display name of the backend on `side`.
    pub fn backend_name(&self, side: Side) -> &str {
        match side {
            Side::Tickets => &self.tickets_name,
            Side::Board => &self.board_name,
        }
    }

    pub fn status_to_board(&self, ticket_status: &str) -> String {
        self.mapping
            .status
            .forward(ticket_status)
            .unwrap_or(self.mapping.default_board_status.as_str())
            .to_string()
    }

    /// Reverse lookup; the first ticket status listed for a board status wins.
    pub fn status_to_ticket(&self, board_status: &str) -> String {
        self.mapping
            .status
            .reverse(board_status)
            .unwrap_or(self.mapping.default_ticket_status.as_str())
            .to_string()
    }

    pub fn priority_to_board(&self, ticket_priority: &str) -> String {
        self.mapping
            .priority
            .forward(ticket_priority)
            .unwrap_or(self.mapping.default_board_priority.as_str())
            .to_string()
    }

    pub fn priority_to_ticket(&self, board_priority: &str) -> String {
        self.mapping
            .priority
            .reverse(board_priority)
            .unwrap_or(self.mapping.default_ticket_priority.as_str())
            .to_string()
    }

    /// Translate `status`, native to `target.other()`, into `target`'s vocabulary.
    pub fn status_for(&self, target: Side, status: &str) -> String {
        match target {
            Side::Board => self.status_to_board(status),
            Side::Tickets => self.status_to_ticket(status),
        }
    }

    /// Fields for the counterpart of `item` on the other side.
    pub fn counterpart_fields(&self, item: &Item) -> CounterpartFields {
        let source_name = self.backend_name(item.side);
        let description = format!(
            "Imported from {source_name} - {}\n\n{}",
            item.id,
            item.description.as_deref().unwrap_or_default()
        );

        match item.side {
            Side::Tickets => CounterpartFields {
                title: format!("{} - {}", item.id, item.title),
                description,
                status: self.status_to_board(&item.status),
                priority: Some(match item.priority.as_deref() {
                    Some(p) => self.priority_to_board(p),
                    None => self.mapping.default_board_priority.clone(),
                }),
                due_date: item.due_date,
                labels: Vec::new(),
            },
            Side::Board => CounterpartFields {
                title: format!("{source_name} - {}", item.title),
                description,
                status: self.status_to_ticket(&item.status),
                priority: item.priority.as_deref().map(|p| self.priority_to_ticket(p)),
                due_date: item.due_date,
                labels: vec![self.container_label(&item.container_name)],
            },
        }
    }

    /// Ticket labels cannot contain spaces.
    fn container_label(&self, container_name: &str) -> String {
        container_name
            .trim()
            .replace(' ', &self.mapping.label_connector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rstest::rstest;
    use tracklink_core::ItemId;

    fn mapper() -> FieldMapper {
        FieldMapper::new(MappingConfig::default(), "JIRA", "ClickUp")
    }

    fn item(side: Side, id: &str, status: &str, priority: Option<&str>) -> Item {
        Item {
            side,
            id: ItemId::from(id),
            title: "Fix login".to_string(),
            description: Some("Users cannot log in".to_string()),
            status: status.to_string(),
            priority: priority.map(str::to_string),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            last_updated: Utc::now(),
            container_name: "Sprint Backlog".to_string(),
        }
    }

    #[rstest]
    #[case("TO DO", "OPEN")]
    #[case("done", "CLOSED")]
    #[case("In Progress", "IN PROGRESS")]
    #[case("BLOCKED", "OPEN")]
    #[case("", "OPEN")]
    fn status_to_board_maps_or_defaults(#[case] ticket: &str, #[case] board: &str) {
        assert_eq!(mapper().status_to_board(ticket), board);
    }

    #[rstest]
    #[case("closed", "DONE")]
    #[case("HOLD", "HOLD")]
    #[case("archived", "TO DO")]
    fn status_to_ticket_maps_or_defaults(#[case] board: &str, #[case] ticket: &str) {
        assert_eq!(mapper().status_to_ticket(board), ticket);
    }

    #[rstest]
    #[case("Highest", "1")]
    #[case("Low", "4")]
    #[case("Blocker", "1")]
    fn priority_to_board_maps_or_defaults(#[case] ticket: &str, #[case] board: &str) {
        assert_eq!(mapper().priority_to_board(ticket), board);
    }

    #[rstest]
    #[case("4", "Lowest")]
    #[case("2", "High")]
    #[case("7", "Medium")]
    fn priority_to_ticket_takes_first_match_or_default(#[case] board: &str, #[case] ticket: &str) {
        assert_eq!(mapper().priority_to_ticket(board), ticket);
    }

    #[test]
    fn status_for_dispatches_by_target_side() {
        let m = mapper();
        assert_eq!(m.status_for(Side::Board, "DONE"), "CLOSED");
        assert_eq!(m.status_for(Side::Tickets, "CLOSED"), "DONE");
    }

    #[test]
    fn ticket_counterpart_fields() {
        let fields = mapper().counterpart_fields(&item(Side::Tickets, "RES-382", "DONE", Some("High")));
        assert_eq!(fields.title, "RES-382 - Fix login");
        assert_eq!(
            fields.description,
            "Imported from JIRA - RES-382\n\nUsers cannot log in"
        );
        assert_eq!(fields.status, "CLOSED");
        assert_eq!(fields.priority.as_deref(), Some("2"));
        assert_eq!(fields.due_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert!(fields.labels.is_empty());
    }

    #[test]
    fn ticket_without_priority_gets_default_board_priority() {
        let fields = mapper().counterpart_fields(&item(Side::Tickets, "RES-1", "TO DO", None));
        assert_eq!(fields.priority.as_deref(), Some("1"));
    }

    #[test]
    fn board_counterpart_fields() {
        let fields = mapper().counterpart_fields(&item(Side::Board, "2x4b1k", "review", Some("3")));
        assert_eq!(fields.title, "ClickUp - Fix login");
        assert!(fields.description.starts_with("Imported from ClickUp - 2x4b1k\n\n"));
        assert_eq!(fields.status, "REVIEW");
        assert_eq!(fields.priority.as_deref(), Some("Medium"));
        assert_eq!(fields.labels, vec!["Sprint_Backlog".to_string()]);
    }

    #[test]
    fn board_without_priority_leaves_priority_unset() {
        let mut source = item(Side::Board, "2x4b1k", "open", None);
        source.description = None;
        let fields = mapper().counterpart_fields(&source);
        assert_eq!(fields.priority, None);
        assert_eq!(fields.description, "Imported from ClickUp - 2x4b1k\n\n");
    }

    #[test]
    fn label_connector_is_configurable() {
        let mapping = MappingConfig {
            label_connector: "-".to_string(),
            ..MappingConfig::default()
        };
        let m = FieldMapper::new(mapping, "JIRA", "ClickUp");
        let fields = m.counterpart_fields(&item(Side::Board, "x", "open", None));
        assert_eq!(fields.labels, vec!["Sprint-Backlog".to_string()]);
    }
}
