use std::sync::Arc;

use crate::application::render::RenderService;
use crate::application::templates::TemplateService;
use crate::infra::uploads::UploadStaging;

#[derive(Clone)]
pub struct AppState {
    pub templates: Arc<TemplateService>,
    pub renders: Arc<RenderService>,
    pub uploads: Arc<UploadStaging>,
    /// Multipart field carrying the template file.
    pub upload_field: Arc<str>,
}
