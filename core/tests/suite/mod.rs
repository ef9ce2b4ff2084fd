mod background_task;
mod exec;
