mod api_trigger;
mod api_workflows;
