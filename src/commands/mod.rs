//! CLI command implementations

mod add;
mod changes;
mod chat;
mod domains;
mod index;
mod init;
mod query;
mod rules;
mod status;

pub use add::{cmd_add_dir, cmd_add_file, AddStats};
pub use changes::{cmd_changes, cmd_history, print_changes, print_history};
pub use chat::{cmd_chat_search, print_chat_response};
pub use domains::{cmd_add_domain, cmd_list_domains, cmd_remove_domain, print_domains, DomainSpec};
pub use index::{cmd_index, print_index_report, IndexReport};
pub use init::cmd_init;
pub use query::{cmd_query, print_query_results, QueryOptions, QueryReport};
pub use rules::{
    cmd_add_rule, cmd_list_rules, cmd_remove_rule, cmd_test_route, print_route, print_rules,
    RuleSpec,
};
pub use status::{cmd_status, print_status, StatusReport};
