use std::collections::HashMap;

use async_trait::async_trait;
use orgperm_application::{TemplateRepository, TemplateUsage};
use orgperm_core::{AppError, AppResult};
use orgperm_domain::{PermissionTemplate, TemplateId};
use tokio::sync::RwLock;

/// In-memory permission template repository.
#[derive(Debug, Default)]
pub struct InMemoryTemplateRepository {
    templates: RwLock<HashMap<TemplateId, PermissionTemplate>>,
    usage: RwLock<Vec<TemplateUsage>>,
}

impl InMemoryTemplateRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the usage rows recorded for a template.
    pub async fn usage_for(&self, template_id: TemplateId) -> Vec<TemplateUsage> {
        self.usage
            .read()
            .await
            .iter()
            .filter(|usage| usage.template_id == template_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn find_template(&self, template_id: TemplateId) -> AppResult<Option<PermissionTemplate>> {
        Ok(self.templates.read().await.get(&template_id).cloned())
    }

    async fn list_templates(&self) -> AppResult<Vec<PermissionTemplate>> {
        let mut values: Vec<PermissionTemplate> =
            self.templates.read().await.values().cloned().collect();
        values.sort_by(|left, right| left.name().cmp(right.name()));

        Ok(values)
    }

    async fn save_template(&self, template: PermissionTemplate) -> AppResult<()> {
        let mut templates = self.templates.write().await;
        if templates
            .values()
            .any(|stored| stored.name() == template.name())
        {
            return Err(AppError::Conflict(format!(
                "permission template '{}' already exists",
                template.name()
            )));
        }

        templates.insert(template.id(), template);
        Ok(())
    }

    async fn update_template(&self, template: PermissionTemplate) -> AppResult<()> {
        let mut templates = self.templates.write().await;
        if !templates.contains_key(&template.id()) {
            return Err(AppError::TemplateNotFound {
                template_id: template.id().to_string(),
            });
        }

        templates.insert(template.id(), template);
        Ok(())
    }

    async fn delete_template(&self, template_id: TemplateId) -> AppResult<()> {
        self.templates
            .write()
            .await
            .remove(&template_id)
            .map(|_| ())
            .ok_or_else(|| AppError::TemplateNotFound {
                template_id: template_id.to_string(),
            })
    }

    async fn record_template_usage(&self, usage: TemplateUsage) -> AppResult<()> {
        self.usage.write().await.push(usage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use orgperm_application::TemplateRepository;
    use orgperm_core::AppError;
    use orgperm_domain::{Capability, PermissionTemplate, TemplateId};

    use super::InMemoryTemplateRepository;

    fn template(name: &str) -> PermissionTemplate {
        let permissions: BTreeSet<Capability> = ["exam:grade", "exam:read"]
            .iter()
            .map(|value| Capability::parse(value).unwrap_or_else(|error| panic!("{error}")))
            .collect();
        PermissionTemplate::new(TemplateId::new(), name, None, permissions, 40, false)
            .unwrap_or_else(|error| panic!("{error}"))
    }

    #[tokio::test]
    async fn duplicate_template_names_conflict() {
        let repository = InMemoryTemplateRepository::new();
        assert!(repository.save_template(template("grader")).await.is_ok());

        let duplicate = repository.save_template(template("grader")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn templates_list_by_name_and_delete() {
        let repository = InMemoryTemplateRepository::new();
        let zeta = template("zeta");
        let alpha = template("alpha");
        assert!(repository.save_template(zeta.clone()).await.is_ok());
        assert!(repository.save_template(alpha).await.is_ok());

        let names: Vec<String> = repository
            .list_templates()
            .await
            .unwrap_or_default()
            .iter()
            .map(|stored| stored.name().to_owned())
            .collect();
        assert_eq!(names, vec!["alpha".to_owned(), "zeta".to_owned()]);

        assert!(repository.delete_template(zeta.id()).await.is_ok());
        let missing = repository.delete_template(zeta.id()).await;
        assert!(matches!(missing, Err(AppError::TemplateNotFound { .. })));
    }
}
