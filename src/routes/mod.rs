use actix_web::web;

pub mod chat;
pub mod session;
pub mod workflow;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(session::start_session)
        .service(session::activity)
        .service(
            web::scope("/workflow")
                .service(workflow::current_view)
                .service(workflow::select_image)
                .service(workflow::analyze)
                .service(workflow::choose)
                .service(workflow::submit_details),
        )
        .service(web::scope("/chat").service(chat::ask));
}
