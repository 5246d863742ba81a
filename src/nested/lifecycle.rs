//! Create/Read/Update/Delete/Import for one list element
//!
//! Every mutation runs fetch -> match -> encode -> PATCH -> wait while holding
//! the parent's lock, so sibling elements of the same parent never lose
//! updates to each other. Different parents proceed concurrently.

use super::accessor::{extract_list_for_read, ParentAccessor};
use super::encoder::{encode_insert, encode_remove_or_not_found, encode_replace};
use super::lock::LockRegistry;
use super::matcher::{decode, find_index};
use super::{NestedResource, ResourceData};
use crate::error::{Error, Result};
use crate::gcp::operation::OperationWaiter;
use crate::gcp::transport::{add_query_params, ApiRequest, Transport};
use crate::template::{self, Vars};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const URL_TEMPLATE: &str = "{{base_path}}{{perimeter}}";
const LOCK_TEMPLATE: &str = "{{perimeter}}";

/// Lifecycle driver for one kind of nested element
pub struct Lifecycle<R: NestedResource> {
    resource: R,
    transport: Arc<dyn Transport>,
    waiter: Arc<dyn OperationWaiter>,
    locks: Arc<LockRegistry>,
    base_path: String,
}

impl<R: NestedResource> Lifecycle<R> {
    pub fn new(
        resource: R,
        transport: Arc<dyn Transport>,
        waiter: Arc<dyn OperationWaiter>,
        locks: Arc<LockRegistry>,
        base_path: &str,
    ) -> Self {
        Self {
            resource,
            transport,
            waiter,
            locks,
            base_path: crate::gcp::client::normalize_base_path(base_path),
        }
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Normalized parent name, validated
    fn parent_key(&self, data: &ResourceData<R::Local>) -> Result<String> {
        let perimeter = template::resource_name(&data.perimeter);
        template::validate_perimeter_name(&perimeter)?;
        Ok(perimeter)
    }

    fn render(&self, template_str: &str, perimeter: &str) -> Result<String> {
        let vars: Vars<'_> = [("base_path", self.base_path.as_str()), ("perimeter", perimeter)]
            .into_iter()
            .collect();
        template::replace_vars(template_str, &vars)
    }

    fn patch_request(&self, url: &str, body: Value, timeout: Duration) -> Result<ApiRequest> {
        let mask = self.resource.field_path().update_mask();
        let url = add_query_params(url, &[("updateMask", mask.as_str())])?;
        Ok(ApiRequest::patch(url, body).with_timeout(timeout))
    }

    /// Add the element to its parent's list
    pub async fn create(&self, data: &mut ResourceData<R::Local>) -> Result<()> {
        let kind = self.resource.kind();
        let perimeter = self.parent_key(data)?;
        self.resource.validate(&data.config)?;
        let candidate = self.resource.expand(&data.config)?;

        let url = self.render(URL_TEMPLATE, &perimeter)?;
        let lock_name = self.render(LOCK_TEMPLATE, &perimeter)?;

        {
            let _guard = self.locks.lock(&lock_name).await?;

            tracing::debug!("Creating new {}: {:?}", kind, candidate);
            let accessor =
                ParentAccessor::new(self.transport.as_ref(), &url, self.resource.field_path());
            let body = encode_insert(&accessor, &self.resource, &candidate, &data.config).await?;

            let request = self.patch_request(&url, body, data.timeouts.create)?;
            let operation = self.transport.send(request).await.map_err(|err| {
                tracing::error!("Error creating {}: {}", kind, err);
                err
            })?;

            // Store the id now; cleared again if the operation does not succeed
            data.id = Some(self.resource.id(&perimeter, &data.config)?);

            let activity = format!("Creating {kind}");
            let response = match self
                .waiter
                .wait(operation, &activity, data.timeouts.create)
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    // The element didn't actually get created
                    data.id = None;
                    tracing::error!("Error waiting to create {}: {}", kind, err);
                    return Err(err);
                },
            };

            if response.get(self.resource.field_path().section).is_some() {
                let items = extract_list_for_read(&response, self.resource.field_path())?;
                let Some((_, item)) =
                    find_index(&self.resource, &items, &candidate, &data.config)?
                else {
                    return Err(Error::malformed(format!(
                        "could not find nested {kind} in operation response"
                    )));
                };
                let api = decode(&self.resource, &item)?;
                data.state = Some(self.resource.flatten(&api, &data.config));
            }
        }

        tracing::info!("Finished creating {} {:?}", kind, data.id);
        self.read(data).await
    }

    /// Refresh `data.state` from the server.
    ///
    /// The element is located from `data.config`, not from the id. When the
    /// parent or the element is gone the id is cleared.
    pub async fn read(&self, data: &mut ResourceData<R::Local>) -> Result<()> {
        let kind = self.resource.kind();
        let perimeter = self.parent_key(data)?;
        let url = self.render(URL_TEMPLATE, &perimeter)?;

        let parent = match self.transport.send(ApiRequest::get(url)).await {
            Ok(parent) => parent,
            Err(err) if err.is_not_found() => {
                tracing::warn!(
                    "Removing {} {:?} because its parent {} is gone",
                    kind,
                    data.id,
                    perimeter
                );
                data.clear();
                return Ok(());
            },
            Err(err) => return Err(err),
        };

        let items = extract_list_for_read(&parent, self.resource.field_path())?;
        let candidate = self.resource.expand(&data.config)?;
        match find_index(&self.resource, &items, &candidate, &data.config)? {
            None => {
                tracing::debug!("Removing {} because it couldn't be matched", kind);
                data.clear();
            },
            Some((_, item)) => {
                let api = decode(&self.resource, &item)?;
                data.state = Some(self.resource.flatten(&api, &data.config));
                if data.id.is_none() {
                    data.id = Some(self.resource.id(&perimeter, &data.config)?);
                }
            },
        }

        Ok(())
    }

    /// Replace the element with `new_config` in a single PATCH.
    ///
    /// Semantically a delete followed by a create, but done as one in-place
    /// substitution under the lock so the list never transiently lacks the
    /// element. If the old element is already gone the new one is appended.
    pub async fn update(&self, data: &mut ResourceData<R::Local>, new_config: R::Local) -> Result<()> {
        let kind = self.resource.kind();
        let perimeter = self.parent_key(data)?;
        self.resource.validate(&new_config)?;

        if self.resource.normalize(&data.config) == self.resource.normalize(&new_config) {
            tracing::debug!("No changes to {}", kind);
            data.config = new_config;
            return self.read(data).await;
        }

        let old = self.resource.expand(&data.config)?;
        let new = self.resource.expand(&new_config)?;
        let url = self.render(URL_TEMPLATE, &perimeter)?;
        let lock_name = self.render(LOCK_TEMPLATE, &perimeter)?;

        {
            let _guard = self.locks.lock(&lock_name).await?;

            tracing::debug!("Updating {} {:?}: {:?}", kind, data.id, new);
            let accessor =
                ParentAccessor::new(self.transport.as_ref(), &url, self.resource.field_path());
            let body = encode_replace(
                &accessor,
                &self.resource,
                (&old, &data.config),
                (&new, &new_config),
            )
            .await?;

            let request = self.patch_request(&url, body, data.timeouts.update)?;
            let operation = self.transport.send(request).await?;

            let activity = format!("Updating {kind}");
            self.waiter
                .wait(operation, &activity, data.timeouts.update)
                .await?;
        }

        data.config = new_config;
        data.id = Some(self.resource.id(&perimeter, &data.config)?);
        tracing::info!("Finished updating {} {:?}", kind, data.id);
        self.read(data).await
    }

    /// Remove the element from its parent's list.
    ///
    /// An element (or parent) that is already gone counts as deleted.
    pub async fn delete(&self, data: &mut ResourceData<R::Local>) -> Result<()> {
        let kind = self.resource.kind();
        let perimeter = self.parent_key(data)?;
        let candidate = self.resource.expand(&data.config)?;
        let url = self.render(URL_TEMPLATE, &perimeter)?;
        let lock_name = self.render(LOCK_TEMPLATE, &perimeter)?;

        let _guard = self.locks.lock(&lock_name).await?;

        let accessor =
            ParentAccessor::new(self.transport.as_ref(), &url, self.resource.field_path());
        let body =
            match encode_remove_or_not_found(&accessor, &self.resource, &candidate, &data.config)
                .await
            {
                Ok(body) => body,
                Err(err) if err.is_not_found() => {
                    tracing::warn!("{} {:?} already absent, nothing to delete", kind, data.id);
                    data.clear();
                    return Ok(());
                },
                Err(err) => return Err(err),
            };

        tracing::debug!("Deleting {} {:?}", kind, data.id);
        let request = self.patch_request(&url, body, data.timeouts.delete)?;
        let operation = match self.transport.send(request).await {
            Ok(operation) => operation,
            Err(err) if err.is_not_found() => {
                tracing::warn!("Parent of {} {:?} disappeared during delete", kind, data.id);
                data.clear();
                return Ok(());
            },
            Err(err) => return Err(err),
        };

        // On failure the id stays so a retry can finish removing the same element
        let activity = format!("Deleting {kind}");
        self.waiter
            .wait(operation, &activity, data.timeouts.delete)
            .await?;

        tracing::info!("Finished deleting {} {:?}", kind, data.id);
        data.clear();
        Ok(())
    }

    /// Turn an import id (plus configuration when the id alone does not
    /// identify the element) into resource data ready for [`read`](Self::read).
    pub fn import(
        &self,
        id: &str,
        config: Option<R::Local>,
    ) -> Result<Vec<ResourceData<R::Local>>> {
        let (perimeter, parsed) = self.resource.parse_import_id(id)?;
        let config = parsed.or(config).ok_or_else(|| {
            Error::invalid_config(format!(
                "importing {} requires its configuration: elements are identified by their contents",
                self.resource.kind()
            ))
        })?;
        self.resource.validate(&config)?;

        let mut data = ResourceData::new(perimeter.clone(), config);
        data.id = Some(self.resource.id(&perimeter, &data.config)?);
        Ok(vec![data])
    }
}
