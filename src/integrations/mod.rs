pub mod graylog;
pub mod jira;
pub mod mcp;
