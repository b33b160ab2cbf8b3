mod starter_templates;
